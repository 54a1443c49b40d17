//! Domain events published on the event bus.

use crate::ascode::{OperationKind, SyncOutcome};
use crate::ids::*;
use crate::permission::AclSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All events emitted by Weave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Import
    WorkflowImported(WorkflowImportedPayload),

    // As-code
    AsCodeOperationQueued(AsCodeOperationQueuedPayload),
    AsCodeOperationCompleted(AsCodeOperationCompletedPayload),
    AsCodeOperationFailed(AsCodeOperationFailedPayload),
}

impl Event {
    /// Returns the bus subject for this event.
    pub fn subject(&self) -> String {
        match self {
            Event::WorkflowImported(p) => format!(
                "workflow.imported.{}.{}",
                subject_token(p.project.as_str()),
                p.workflow_id
            ),
            Event::AsCodeOperationQueued(p) => format!("ascode.queued.{}", p.operation_id),
            Event::AsCodeOperationCompleted(p) => format!("ascode.completed.{}", p.operation_id),
            Event::AsCodeOperationFailed(p) => format!("ascode.failed.{}", p.operation_id),
        }
    }
}

/// One subject token: separators and wildcards become `_`.
fn subject_token(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowImportedPayload {
    pub workflow_id: WorkflowId,
    pub project: ProjectKey,
    pub workflow: String,
    pub revision: u64,
    pub created: bool,
    pub acl_source: AclSource,
    pub imported_by: String,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsCodeOperationQueuedPayload {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub project: ProjectKey,
    pub workflow: String,
    pub repository: String,
    pub branch: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsCodeOperationCompletedPayload {
    pub operation_id: OperationId,
    pub project: ProjectKey,
    pub workflow: String,
    pub outcome: SyncOutcome,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsCodeOperationFailedPayload {
    pub operation_id: OperationId,
    pub project: ProjectKey,
    pub workflow: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imported(project: &str, workflow: &str) -> (WorkflowId, Event) {
        let workflow_id = WorkflowId::new();
        let event = Event::WorkflowImported(WorkflowImportedPayload {
            workflow_id,
            project: ProjectKey::new(project),
            workflow: workflow.to_string(),
            revision: 1,
            created: true,
            acl_source: AclSource::Inherited,
            imported_by: "alice".to_string(),
            imported_at: Utc::now(),
        });
        (workflow_id, event)
    }

    #[test]
    fn test_subjects() {
        let (workflow_id, event) = imported("PROJ", "build");
        assert_eq!(event.subject(), format!("workflow.imported.PROJ.{workflow_id}"));

        let id = OperationId::new();
        let failed = Event::AsCodeOperationFailed(AsCodeOperationFailedPayload {
            operation_id: id,
            project: ProjectKey::new("PROJ"),
            workflow: "build".to_string(),
            error: "push rejected".to_string(),
            failed_at: Utc::now(),
        });
        assert_eq!(failed.subject(), format!("ascode.failed.{id}"));
    }

    #[test]
    fn test_imported_subject_keeps_four_tokens() {
        let (workflow_id, event) = imported("my.proj", "release.v2");
        let subject = event.subject();
        assert_eq!(subject, format!("workflow.imported.my_proj.{workflow_id}"));
        assert_eq!(subject.split('.').count(), 4);
    }

    #[test]
    fn test_event_is_tagged() {
        let event = Event::AsCodeOperationQueued(AsCodeOperationQueuedPayload {
            operation_id: OperationId::new(),
            kind: OperationKind::Migrate,
            project: ProjectKey::new("PROJ"),
            workflow: "build".to_string(),
            repository: "org/repo".to_string(),
            branch: "main".to_string(),
            queued_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "as_code_operation_queued");
        assert_eq!(json["kind"], "migrate");
    }
}
