//! Project and stored-workflow types.

use crate::graph::WorkflowGraph;
use crate::ids::{GroupName, ProjectKey, WorkflowId};
use crate::permission::PermissionEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The slice of a project the topology engine needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub key: ProjectKey,
    pub name: String,
    /// Default group permissions inherited by every workflow.
    pub groups: Vec<PermissionEntry>,
    /// Pipelines a node declaration may reference.
    pub pipelines: BTreeSet<String>,
    /// Repository used when a workflow is migrated to as-code.
    #[serde(default)]
    pub repository: Option<RepositoryLink>,
}

impl Project {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: ProjectKey::new(key),
            name: name.into(),
            groups: vec![],
            pipelines: BTreeSet::new(),
            repository: None,
        }
    }

    pub fn with_group(mut self, entry: PermissionEntry) -> Self {
        self.groups.push(entry);
        self
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipelines.insert(pipeline.into());
        self
    }

    pub fn with_repository(mut self, repository: RepositoryLink) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn group_names(&self) -> BTreeSet<GroupName> {
        self.groups.iter().map(|e| e.group.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLink {
    pub vcs_server: String,
    pub fullname: String,
}

impl RepositoryLink {
    pub fn new(vcs_server: impl Into<String>, fullname: impl Into<String>) -> Self {
        Self {
            vcs_server: vcs_server.into(),
            fullname: fullname.into(),
        }
    }
}

/// A workflow as held by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub id: WorkflowId,
    pub project: ProjectKey,
    pub graph: WorkflowGraph,
    /// Incremented on every successful replace.
    pub revision: u64,
    /// Set once the workflow is synchronized with a repository.
    pub from_repository: Option<String>,
    /// Name of the template that generated this workflow, if any.
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredWorkflow {
    pub fn name(&self) -> &str {
        &self.graph.name
    }

    pub fn is_as_code(&self) -> bool {
        self.from_repository.is_some()
    }
}
