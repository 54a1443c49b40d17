//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the topology engine and the
//! external collaborators: persistence, project directory, variable
//! storage, as-code synchronization and the event bus.

use crate::ascode::{SyncOutcome, SyncRequest};
use crate::events::Event;
use crate::ids::*;
use crate::project::{Project, StoredWorkflow};
use crate::variables::{CallerIdentity, Variable, VariableRef, VariableScope, VariableType};
use crate::Result;
use async_trait::async_trait;
use futures::Stream;
use std::collections::BTreeSet;
use std::pin::Pin;

/// Stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// Event bus for publishing and subscribing to events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> Result<()>;

    /// Subscribe to events matching a pattern.
    /// Pattern supports wildcards: `ascode.*.>`, `workflow.>`
    async fn subscribe(&self, pattern: &str) -> Result<EventStream>;
}

/// Persistence for workflow graphs and their ACL.
///
/// `replace` is the transactional boundary: it either stores the whole
/// workflow (graph and ACL) or fails without any visible partial write.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Load a workflow by project and name.
    async fn load(&self, project: &ProjectKey, name: &str) -> Result<Option<StoredWorkflow>>;

    /// List the workflows of a project.
    async fn list(&self, project: &ProjectKey) -> Result<Vec<StoredWorkflow>>;

    /// Replace (or create) a workflow.
    ///
    /// `expected_revision` is the revision the caller read; `None` means
    /// the caller expects no workflow to exist. Returns the stored
    /// workflow with its new revision, or `PersistenceConflict` when the
    /// stored revision differs.
    async fn replace(
        &self,
        workflow: StoredWorkflow,
        expected_revision: Option<u64>,
    ) -> Result<StoredWorkflow>;

    /// Record that a workflow is now synchronized with a repository.
    async fn mark_as_code(
        &self,
        project: &ProjectKey,
        name: &str,
        repository: &str,
    ) -> Result<StoredWorkflow>;
}

/// Read access to projects and groups.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Get a project by key.
    async fn project(&self, key: &ProjectKey) -> Result<Project>;

    /// Every group registered on the platform.
    async fn known_groups(&self) -> Result<BTreeSet<GroupName>>;
}

/// Secret-aware variable storage.
///
/// Masked reads never return a clear secret value; decrypted reads
/// require an authenticated caller.
#[async_trait]
pub trait VariableGateway: Send + Sync {
    /// Get a variable, with secrets replaced by the placeholder.
    async fn get_masked(&self, reference: &VariableRef) -> Result<Variable>;

    /// Get a variable in clear. Fails with `PermissionDenied` for callers
    /// that are not allowed to see secrets.
    async fn get_decrypted(&self, reference: &VariableRef, caller: &CallerIdentity)
    -> Result<Variable>;

    /// List an owner's variables, masked.
    async fn list_masked(&self, scope: VariableScope, owner: &str) -> Result<Vec<Variable>>;

    /// List an owner's variables in clear.
    async fn list_decrypted(
        &self,
        scope: VariableScope,
        owner: &str,
        caller: &CallerIdentity,
    ) -> Result<Vec<Variable>>;

    /// Create a variable. Returns the masked form.
    async fn insert(
        &self,
        reference: &VariableRef,
        var_type: VariableType,
        value: &str,
        caller: &CallerIdentity,
    ) -> Result<Variable>;

    /// Update a variable. A secret updated with the placeholder keeps its
    /// stored value. Returns the masked form.
    async fn update(
        &self,
        reference: &VariableRef,
        var_type: VariableType,
        value: &str,
        caller: &CallerIdentity,
    ) -> Result<Variable>;

    /// Delete a variable. Requires an authenticated caller.
    async fn delete(&self, reference: &VariableRef, caller: &CallerIdentity) -> Result<()>;
}

/// Queue for as-code synchronization work.
#[async_trait]
pub trait SyncDispatcher: Send + Sync {
    /// Accept a request for background processing. Returns as soon as the
    /// request is queued; the outcome is delivered out of band.
    async fn submit(&self, request: SyncRequest) -> Result<OperationId>;
}

/// Git-side collaborator performing clone, push and pull-request creation.
#[async_trait]
pub trait GitSynchronizer: Send + Sync {
    /// Push the request's payload. Timeouts and retries are the
    /// implementation's concern.
    async fn synchronize(&self, request: &SyncRequest) -> Result<SyncOutcome>;
}
