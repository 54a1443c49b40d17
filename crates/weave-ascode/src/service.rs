//! As-code service.
//!
//! Validates as-code requests, produces the canonical export and hands it
//! to the synchronization dispatcher. Callers get the pending operation
//! back immediately.

use crate::operation::OperationTracker;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use weave_core::ascode::{Operation, OperationKind, OperationStatus, SyncRequest};
use weave_core::events::{AsCodeOperationQueuedPayload, Event};
use weave_core::ids::{OperationId, ProjectKey};
use weave_core::ports::{EventBus, ProjectDirectory, SyncDispatcher, WorkflowRepository};
use weave_core::project::StoredWorkflow;
use weave_core::variables::CallerIdentity;
use weave_core::workflow::WorkflowDocument;
use weave_core::{Error, Result};
use weave_engine::{CanonicalExporter, ExportOptions, Parser, PermissionResolver, TopologyBuilder};

pub struct AsCodeService {
    repository: Arc<dyn WorkflowRepository>,
    projects: Arc<dyn ProjectDirectory>,
    dispatcher: Arc<dyn SyncDispatcher>,
    tracker: Arc<OperationTracker>,
    events: Arc<dyn EventBus>,
}

impl AsCodeService {
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        projects: Arc<dyn ProjectDirectory>,
        dispatcher: Arc<dyn SyncDispatcher>,
        tracker: Arc<OperationTracker>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            repository,
            projects,
            dispatcher,
            tracker,
            events,
        }
    }

    /// Push a new version of an as-code workflow to its repository.
    #[instrument(skip_all, fields(project = %project, workflow = %workflow))]
    pub async fn push_update(
        &self,
        project: &ProjectKey,
        workflow: &str,
        input: &str,
        branch: &str,
        message: &str,
        caller: &CallerIdentity,
    ) -> Result<Operation> {
        check_request(branch, message, caller)?;

        let stored = self.load(project, workflow).await?;
        let repository = match (&stored.from_repository, &stored.template) {
            (_, Some(template)) => {
                return Err(Error::Forbidden(format!(
                    "workflow '{workflow}' is generated from template '{template}'"
                )));
            }
            (None, None) => {
                return Err(Error::Forbidden(format!("workflow '{workflow}' is not as-code")));
            }
            (Some(repository), None) => repository.clone(),
        };

        let project = self.projects.project(project).await?;
        let parsed = Parser::new(&project.pipelines).parse_yaml(input)?;
        if parsed.name != workflow {
            return Err(Error::InvalidRequest(format!(
                "workflow '{workflow}' cannot be renamed to '{}' by an as-code update",
                parsed.name
            )));
        }
        let mut graph = TopologyBuilder::new().build(&parsed)?;
        if let Some(explicit) = parsed.permissions.as_deref() {
            PermissionResolver::new(project.groups.clone())
                .with_known_groups(self.projects.known_groups().await?)
                .apply(&mut graph, Some(explicit))?;
        }
        let payload = CanonicalExporter::new(ExportOptions::with_permissions()).export(&graph)?;

        self.submit(
            OperationKind::Update,
            &stored,
            payload,
            repository,
            branch,
            message,
            caller,
        )
        .await
    }

    /// Export a stored workflow into the project's repository.
    ///
    /// The workflow is linked to the repository once the operation
    /// succeeds.
    #[instrument(skip_all, fields(project = %project, workflow = %workflow))]
    pub async fn migrate(
        &self,
        project: &ProjectKey,
        workflow: &str,
        branch: &str,
        message: &str,
        caller: &CallerIdentity,
    ) -> Result<Operation> {
        check_request(branch, message, caller)?;

        let stored = self.load(project, workflow).await?;
        if stored.is_as_code() {
            return Err(Error::Forbidden(format!(
                "workflow '{workflow}' is already as-code"
            )));
        }
        let link = self.projects.project(project).await?.repository.ok_or_else(|| {
            Error::InvalidRequest(format!("project '{project}' has no repository link"))
        })?;

        let payload =
            CanonicalExporter::new(ExportOptions::with_permissions()).export(&stored.graph)?;
        let operation = self
            .submit(
                OperationKind::Migrate,
                &stored,
                payload,
                link.fullname,
                branch,
                message,
                caller,
            )
            .await?;

        self.link_on_success(operation.id, stored.project.clone(), workflow.to_string());
        Ok(operation)
    }

    /// Current state of an operation.
    pub async fn operation(&self, id: OperationId) -> Result<Operation> {
        self.tracker.get(id).await
    }

    async fn load(&self, project: &ProjectKey, workflow: &str) -> Result<StoredWorkflow> {
        self.repository
            .load(project, workflow)
            .await?
            .ok_or_else(|| Error::WorkflowNotFound(workflow.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        kind: OperationKind,
        stored: &StoredWorkflow,
        payload: WorkflowDocument,
        repository: String,
        branch: &str,
        message: &str,
        caller: &CallerIdentity,
    ) -> Result<Operation> {
        let request = SyncRequest {
            id: OperationId::new(),
            kind,
            project: stored.project.clone(),
            workflow: stored.name().to_string(),
            payload,
            repository,
            branch: branch.to_string(),
            message: message.to_string(),
            requested_by: caller.username.clone(),
        };
        let pending = Operation::pending(&request);
        let queued = Event::AsCodeOperationQueued(AsCodeOperationQueuedPayload {
            operation_id: request.id,
            kind,
            project: request.project.clone(),
            workflow: request.workflow.clone(),
            repository: request.repository.clone(),
            branch: request.branch.clone(),
            queued_at: Utc::now(),
        });

        let id = self.dispatcher.submit(request).await?;
        info!(operation = %id, kind = ?kind, "As-code operation queued");

        if let Err(e) = self.events.publish(queued).await {
            warn!("Failed to publish as-code event: {}", e);
        }
        Ok(pending)
    }

    fn link_on_success(&self, id: OperationId, project: ProjectKey, workflow: String) {
        let tracker = self.tracker.clone();
        let repository = self.repository.clone();
        tokio::spawn(async move {
            let operation = match tracker.wait(id).await {
                Ok(operation) => operation,
                Err(e) => {
                    error!(operation = %id, "Lost track of migration: {}", e);
                    return;
                }
            };
            let outcome = match (operation.status, operation.outcome) {
                (OperationStatus::Done, Some(outcome)) => outcome,
                _ => {
                    warn!(operation = %id, workflow = %workflow, "Migration did not complete, workflow left unchanged");
                    return;
                }
            };
            match repository
                .mark_as_code(&project, &workflow, &outcome.repository_url)
                .await
            {
                Ok(stored) => info!(
                    workflow = %workflow,
                    repository = %outcome.repository_url,
                    revision = stored.revision,
                    "Workflow migrated to as-code"
                ),
                Err(e) => error!(workflow = %workflow, "Cannot link workflow to repository: {}", e),
            }
        });
    }
}

fn check_request(branch: &str, message: &str, caller: &CallerIdentity) -> Result<()> {
    if !caller.authenticated {
        return Err(Error::PermissionDenied(
            "as-code operations require an authenticated caller".to_string(),
        ));
    }
    if branch.trim().is_empty() {
        return Err(Error::InvalidRequest("branch is required".to_string()));
    }
    if message.trim().is_empty() {
        return Err(Error::InvalidRequest("commit message is required".to_string()));
    }
    Ok(())
}
