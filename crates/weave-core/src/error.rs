//! Error types for Weave.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Import errors
    #[error("Malformed workflow input at '{node}': {reason}")]
    MalformedInput { node: String, reason: String },

    #[error("{}", describe_topology(.cyclic, .unreachable))]
    CyclicOrUnreachableGraph {
        cyclic: Vec<String>,
        unreachable: Vec<String>,
    },

    #[error("Permission conflict: {0}")]
    PermissionConflict(String),

    #[error("Concurrent update of workflow '{workflow}' (expected revision {expected:?}, found {found:?})")]
    PersistenceConflict {
        workflow: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    // Lookup errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow already exists: {0}")]
    WorkflowAlreadyExists(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Collaborator errors
    #[error("Synchronization failed: {0}")]
    Synchronization(String),

    #[error("Synchronization queue is full: {0}")]
    QueueFull(String),

    #[error("Event bus error: {0}")]
    EventBus(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::MalformedInput`].
    pub fn malformed(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedInput {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::PersistenceConflict { .. } | Error::QueueFull(_)
        )
    }
}

fn describe_topology(cyclic: &[String], unreachable: &[String]) -> String {
    let mut parts = Vec::new();
    if !cyclic.is_empty() {
        parts.push(format!("cycle through [{}]", cyclic.join(", ")));
    }
    if !unreachable.is_empty() {
        parts.push(format!("unreachable from any root: [{}]", unreachable.join(", ")));
    }
    format!("Cyclic or unreachable workflow graph: {}", parts.join("; "))
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_persistence_conflict_is_retryable() {
        let conflict = Error::PersistenceConflict {
            workflow: "build".to_string(),
            expected: Some(1),
            found: Some(2),
        };
        assert!(conflict.is_retryable());
        assert!(!Error::malformed("root", "bad").is_retryable());
        assert!(!Error::PermissionConflict("x".to_string()).is_retryable());
    }

    #[test]
    fn test_topology_message_lists_names() {
        let err = Error::CyclicOrUnreachableGraph {
            cyclic: vec!["a".to_string(), "b".to_string()],
            unreachable: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic or unreachable workflow graph: cycle through [a, b]"
        );
    }

    #[test]
    fn test_malformed_names_node() {
        let err = Error::malformed("deploy", "unknown predecessor 'ghost'");
        assert!(err.to_string().contains("'deploy'"));
        assert!(err.to_string().contains("ghost"));
    }
}
