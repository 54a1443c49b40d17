//! In-memory implementation of WorkflowRepository.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use weave_core::ids::ProjectKey;
use weave_core::ports::WorkflowRepository;
use weave_core::project::StoredWorkflow;
use weave_core::{Error, Result};

type Key = (ProjectKey, String);

/// In-memory implementation of WorkflowRepository.
///
/// Every write happens under one lock, so a replace is either fully
/// visible or not at all.
#[derive(Default)]
pub struct MemoryWorkflowRepository {
    workflows: RwLock<HashMap<Key, StoredWorkflow>>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowRepository {
    async fn load(&self, project: &ProjectKey, name: &str) -> Result<Option<StoredWorkflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&(project.clone(), name.to_string())).cloned())
    }

    async fn list(&self, project: &ProjectKey) -> Result<Vec<StoredWorkflow>> {
        let workflows = self.workflows.read().await;
        let mut found: Vec<_> = workflows
            .values()
            .filter(|w| &w.project == project)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(found)
    }

    async fn replace(
        &self,
        mut workflow: StoredWorkflow,
        expected_revision: Option<u64>,
    ) -> Result<StoredWorkflow> {
        let key = (workflow.project.clone(), workflow.name().to_string());
        let mut workflows = self.workflows.write().await;
        let current = workflows.get(&key);
        let now = Utc::now();

        match (current, expected_revision) {
            (None, None) => {
                workflow.revision = 1;
                workflow.created_at = now;
            }
            (Some(current), Some(expected)) if current.revision == expected => {
                workflow.id = current.id;
                workflow.created_at = current.created_at;
                workflow.revision = current.revision + 1;
            }
            (current, expected) => {
                return Err(Error::PersistenceConflict {
                    workflow: key.1,
                    expected,
                    found: current.map(|c| c.revision),
                });
            }
        }
        workflow.updated_at = now;

        debug!(
            project = %workflow.project,
            workflow = %workflow.name(),
            revision = workflow.revision,
            "Workflow replaced"
        );
        workflows.insert(key, workflow.clone());
        Ok(workflow)
    }

    async fn mark_as_code(
        &self,
        project: &ProjectKey,
        name: &str,
        repository: &str,
    ) -> Result<StoredWorkflow> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&(project.clone(), name.to_string()))
            .ok_or_else(|| Error::WorkflowNotFound(name.to_string()))?;
        workflow.from_repository = Some(repository.to_string());
        workflow.revision += 1;
        workflow.updated_at = Utc::now();
        debug!(project = %project, workflow = %name, repository, "Workflow marked as code");
        Ok(workflow.clone())
    }
}
