//! Workflow import orchestration.
//!
//! An import decodes a flat document, builds the canonical graph, resolves
//! its permissions and replaces the stored workflow in one step. Nothing is
//! persisted unless every step succeeds.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use weave_core::events::{Event, WorkflowImportedPayload};
use weave_core::ids::{ProjectKey, WorkflowId};
use weave_core::permission::AclSource;
use weave_core::ports::{EventBus, ProjectDirectory, WorkflowRepository};
use weave_core::project::StoredWorkflow;
use weave_core::{Error, Result};
use weave_engine::{Parser, PermissionResolver, TopologyBuilder};

/// What an import is allowed to do with an existing workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportTarget {
    /// Create a new workflow; replacing one requires `force`.
    #[default]
    Create,
    /// Update the named workflow, which must exist.
    Update { workflow: String },
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub force: bool,
    pub target: ImportTarget,
    /// Username recorded on the import event.
    pub user: String,
}

impl ImportOptions {
    pub fn create(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn update(workflow: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            force: false,
            target: ImportTarget::Update {
                workflow: workflow.into(),
            },
            user: user.into(),
        }
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Summary of a successful import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub workflow: String,
    pub workflow_id: WorkflowId,
    pub revision: u64,
    pub created: bool,
    pub acl_source: AclSource,
    pub joins: usize,
    pub roots: usize,
    pub messages: Vec<String>,
}

pub struct WorkflowImporter {
    repository: Arc<dyn WorkflowRepository>,
    projects: Arc<dyn ProjectDirectory>,
    events: Arc<dyn EventBus>,
}

impl WorkflowImporter {
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        projects: Arc<dyn ProjectDirectory>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            repository,
            projects,
            events,
        }
    }

    #[instrument(skip_all, fields(project = %project))]
    pub async fn import(
        &self,
        project: &ProjectKey,
        input: &str,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        let project = self.projects.project(project).await?;

        let parsed = Parser::new(&project.pipelines).parse_yaml(input)?;
        let mut graph = TopologyBuilder::new().build(&parsed)?;

        let existing = self.repository.load(&project.key, &graph.name).await?;
        match (&options.target, &existing) {
            (ImportTarget::Create, Some(_)) if !options.force => {
                return Err(Error::WorkflowAlreadyExists(graph.name.clone()));
            }
            (ImportTarget::Update { workflow }, _) if *workflow != graph.name => {
                return Err(Error::InvalidRequest(format!(
                    "workflow '{workflow}' cannot be renamed to '{}' by an import",
                    graph.name
                )));
            }
            (ImportTarget::Update { workflow }, None) => {
                return Err(Error::WorkflowNotFound(workflow.clone()));
            }
            _ => {}
        }

        let resolver = PermissionResolver::new(project.groups.clone())
            .with_known_groups(self.projects.known_groups().await?);
        let previous = existing.as_ref().map(|w| w.graph.acl.as_slice());
        let acl = resolver.resolve(parsed.permissions.as_deref(), previous)?;
        graph.acl = acl.entries.clone();

        let mut messages = Vec::new();
        if !acl.granted.is_empty() && existing.is_some() {
            messages.push(format!("Permission granted to {}", join_names(&acl.granted)));
        }
        if !acl.revoked.is_empty() {
            messages.push(format!("Permission revoked for {}", join_names(&acl.revoked)));
        }

        let now = Utc::now();
        let created = existing.is_none();
        let expected_revision = existing.as_ref().map(|w| w.revision);
        let stored = match existing {
            Some(previous) => StoredWorkflow {
                graph,
                updated_at: now,
                ..previous
            },
            None => StoredWorkflow {
                id: WorkflowId::new(),
                project: project.key.clone(),
                graph,
                revision: 0,
                from_repository: None,
                template: None,
                created_at: now,
                updated_at: now,
            },
        };

        let stored = self.repository.replace(stored, expected_revision).await?;
        messages.push(if created {
            format!("Workflow {} has been created", stored.name())
        } else {
            format!("Workflow {} has been updated", stored.name())
        });

        info!(
            workflow = %stored.name(),
            revision = stored.revision,
            created,
            acl_source = ?acl.source,
            "Workflow imported"
        );

        self.publish_imported(&stored, created, acl.source, options.user);

        Ok(ImportReport {
            workflow: stored.name().to_string(),
            workflow_id: stored.id,
            revision: stored.revision,
            created,
            acl_source: acl.source,
            joins: stored.graph.joins.len(),
            roots: stored.graph.roots.len(),
            messages,
        })
    }

    fn publish_imported(
        &self,
        stored: &StoredWorkflow,
        created: bool,
        acl_source: AclSource,
        user: String,
    ) {
        let event = Event::WorkflowImported(WorkflowImportedPayload {
            workflow_id: stored.id,
            project: stored.project.clone(),
            workflow: stored.name().to_string(),
            revision: stored.revision,
            created,
            acl_source,
            imported_by: user,
            imported_at: Utc::now(),
        });
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = events.publish(event).await {
                warn!("Failed to publish import event: {}", e);
            }
        });
    }
}

fn join_names(groups: &[weave_core::ids::GroupName]) -> String {
    groups
        .iter()
        .map(|g| g.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
