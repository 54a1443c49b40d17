//! Test context providing access to all test infrastructure.

use crate::fixtures::ProjectFixture;
use crate::helpers::FakeGitSynchronizer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use weave_ascode::{
    AsCodeService, ChannelDispatcher, DispatcherConfig, ImportOptions, ImportReport,
    OperationTracker, WorkflowImporter,
};
use weave_core::Result;
use weave_core::ids::ProjectKey;
use weave_core::ports::WorkflowRepository;
use weave_core::project::{Project, StoredWorkflow};
use weave_store::{MemoryEventBus, MemoryProjectDirectory, MemoryWorkflowRepository};

/// Every service wired over in-memory adapters.
///
/// Dropping the context stops the as-code worker.
pub struct TestContext {
    pub project: ProjectKey,
    pub repository: Arc<MemoryWorkflowRepository>,
    pub projects: Arc<MemoryProjectDirectory>,
    pub events: Arc<MemoryEventBus>,
    pub git: Arc<FakeGitSynchronizer>,
    pub tracker: Arc<OperationTracker>,
    pub importer: WorkflowImporter,
    pub ascode: AsCodeService,
    worker: JoinHandle<()>,
}

impl TestContext {
    /// Context around [`ProjectFixture::standard`].
    pub async fn new() -> Self {
        Self::with_project(ProjectFixture::standard()).await
    }

    pub async fn with_project(project: Project) -> Self {
        crate::init_test_logging();

        let key = project.key.clone();
        let repository = Arc::new(MemoryWorkflowRepository::new());
        let projects = Arc::new(MemoryProjectDirectory::new());
        projects.add_project(project).await;
        let events = Arc::new(MemoryEventBus::new());
        let git = Arc::new(FakeGitSynchronizer::new());
        let tracker = Arc::new(OperationTracker::new());

        let (dispatcher, worker) = ChannelDispatcher::spawn(
            DispatcherConfig::default().with_worker_name("test-worker"),
            git.clone(),
            tracker.clone(),
            events.clone(),
        );

        let importer = WorkflowImporter::new(repository.clone(), projects.clone(), events.clone());
        let ascode = AsCodeService::new(
            repository.clone(),
            projects.clone(),
            Arc::new(dispatcher),
            tracker.clone(),
            events.clone(),
        );

        Self {
            project: key,
            repository,
            projects,
            events,
            git,
            tracker,
            importer,
            ascode,
            worker,
        }
    }

    /// Import a document as a new workflow.
    pub async fn import(&self, document: &str) -> Result<ImportReport> {
        self.importer
            .import(&self.project, document, ImportOptions::create("tester"))
            .await
    }

    /// Import a document over an existing workflow of the same name.
    pub async fn reimport(&self, document: &str) -> Result<ImportReport> {
        self.importer
            .import(&self.project, document, ImportOptions::create("tester").force())
            .await
    }

    pub async fn stored(&self, name: &str) -> Option<StoredWorkflow> {
        self.repository.load(&self.project, name).await.ok().flatten()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
