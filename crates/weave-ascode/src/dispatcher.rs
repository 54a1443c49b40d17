//! Background dispatcher for as-code synchronization.
//!
//! Requests go through a bounded queue to a single worker that calls the
//! git collaborator and records the outcome.

use crate::operation::OperationTracker;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use weave_core::ascode::SyncRequest;
use weave_core::events::{AsCodeOperationCompletedPayload, AsCodeOperationFailedPayload, Event};
use weave_core::ids::OperationId;
use weave_core::ports::{EventBus, GitSynchronizer, SyncDispatcher};
use weave_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Queue capacity; `submit` fails with `QueueFull` once it is reached.
    pub capacity: usize,
    pub worker_name: String,
}

impl DispatcherConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            worker_name: "ascode-worker".to_string(),
        }
    }
}

/// Dispatcher backed by a tokio channel.
pub struct ChannelDispatcher {
    sender: mpsc::Sender<SyncRequest>,
    tracker: Arc<OperationTracker>,
}

impl ChannelDispatcher {
    /// Start the worker and return the dispatcher feeding it.
    ///
    /// The worker stops once every dispatcher clone is dropped and the
    /// queue is drained.
    pub fn spawn(
        config: DispatcherConfig,
        git: Arc<dyn GitSynchronizer>,
        tracker: Arc<OperationTracker>,
        events: Arc<dyn EventBus>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let worker = Worker {
            name: config.worker_name,
            git,
            tracker: tracker.clone(),
            events,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender, tracker }, handle)
    }
}

#[async_trait]
impl SyncDispatcher for ChannelDispatcher {
    /// Queue a request without waiting on the worker.
    ///
    /// Nothing is registered when the queue is full or closed.
    async fn submit(&self, request: SyncRequest) -> Result<OperationId> {
        let permit = self.sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => {
                warn!(operation = %request.id, workflow = %request.workflow, "As-code queue is full");
                Error::QueueFull(format!(
                    "operation {} refused, retry later",
                    request.id
                ))
            }
            TrySendError::Closed(()) => {
                Error::Synchronization("as-code worker is not running".to_string())
            }
        })?;

        let id = request.id;
        self.tracker.register(&request).await;
        permit.send(request);
        Ok(id)
    }
}

struct Worker {
    name: String,
    git: Arc<dyn GitSynchronizer>,
    tracker: Arc<OperationTracker>,
    events: Arc<dyn EventBus>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<SyncRequest>) {
        info!(worker = %self.name, "Starting as-code worker");
        while let Some(request) = receiver.recv().await {
            self.process(request).await;
        }
        info!(worker = %self.name, "As-code worker stopped");
    }

    async fn process(&self, request: SyncRequest) {
        if let Err(e) = self.tracker.mark_processing(request.id).await {
            error!(operation = %request.id, "Cannot start operation: {}", e);
            return;
        }

        let event = match self.git.synchronize(&request).await {
            Ok(outcome) => {
                info!(
                    operation = %request.id,
                    workflow = %request.workflow,
                    repository = %outcome.repository_url,
                    "As-code operation done"
                );
                if let Err(e) = self.tracker.complete(request.id, outcome.clone()).await {
                    error!(operation = %request.id, "Cannot record outcome: {}", e);
                }
                Event::AsCodeOperationCompleted(AsCodeOperationCompletedPayload {
                    operation_id: request.id,
                    project: request.project,
                    workflow: request.workflow,
                    outcome,
                    completed_at: Utc::now(),
                })
            }
            Err(err) => {
                warn!(operation = %request.id, workflow = %request.workflow, "As-code operation failed: {}", err);
                if let Err(e) = self.tracker.fail(request.id, err.to_string()).await {
                    error!(operation = %request.id, "Cannot record failure: {}", e);
                }
                Event::AsCodeOperationFailed(AsCodeOperationFailedPayload {
                    operation_id: request.id,
                    project: request.project,
                    workflow: request.workflow,
                    error: err.to_string(),
                    failed_at: Utc::now(),
                })
            }
        };

        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish as-code event: {}", e);
        }
    }
}
