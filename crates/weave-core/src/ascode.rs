//! As-code synchronization types.
//!
//! An as-code operation carries a canonical export to an external
//! repository. Operations are asynchronous: submitting one returns a
//! correlation id, and the outcome is recorded later.

use crate::ids::{OperationId, ProjectKey};
use crate::workflow::WorkflowDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Update of a workflow that is already as-code.
    Update,
    /// First export of a workflow into a repository.
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Done | OperationStatus::Error)
    }
}

/// Work item handed to the synchronization dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub id: OperationId,
    pub kind: OperationKind,
    pub project: ProjectKey,
    pub workflow: String,
    pub payload: WorkflowDocument,
    pub repository: String,
    pub branch: String,
    pub message: String,
    pub requested_by: String,
}

/// Result reported by the git collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// URL of the repository the export was pushed to.
    pub repository_url: String,
    /// Pull request opened for the change, if any.
    pub pull_request_url: Option<String>,
}

/// Operation as seen by pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub workflow: String,
    pub status: OperationStatus,
    pub outcome: Option<SyncOutcome>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn pending(request: &SyncRequest) -> Self {
        Self {
            id: request.id,
            kind: request.kind,
            workflow: request.workflow.clone(),
            status: OperationStatus::Pending,
            outcome: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }
}
