//! Operation tracking.
//!
//! Records the lifecycle of every submitted as-code operation so callers
//! can poll by id or wait for the outcome. Finished operations are kept
//! for a while, then evicted according to a [`RetentionPolicy`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::debug;
use weave_core::ascode::{Operation, OperationStatus, SyncOutcome, SyncRequest};
use weave_core::ids::OperationId;
use weave_core::{Error, Result};

/// How long finished operations stay pollable.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Finished operations older than this are evicted.
    pub ttl: Duration,
    /// Upper bound on finished operations kept at once; oldest go first.
    pub max_finished: usize,
}

impl RetentionPolicy {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_finished(mut self, max_finished: usize) -> Self {
        self.max_finished = max_finished;
        self
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_finished: 1024,
        }
    }
}

pub struct OperationTracker {
    operations: RwLock<HashMap<OperationId, Operation>>,
    changes: watch::Sender<u64>,
    retention: RetentionPolicy,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            operations: RwLock::new(HashMap::new()),
            changes,
            retention,
        }
    }

    /// Record a newly submitted request as pending.
    ///
    /// Expired finished operations are evicted first.
    pub async fn register(&self, request: &SyncRequest) -> Operation {
        let operation = Operation::pending(request);
        {
            let mut operations = self.operations.write().await;
            self.evict(&mut operations);
            operations.insert(operation.id, operation.clone());
        }
        self.notify();
        operation
    }

    pub async fn mark_processing(&self, id: OperationId) -> Result<Operation> {
        self.transition(id, |op| op.status = OperationStatus::Processing)
            .await
    }

    pub async fn complete(&self, id: OperationId, outcome: SyncOutcome) -> Result<Operation> {
        self.transition(id, |op| {
            op.status = OperationStatus::Done;
            op.outcome = Some(outcome);
            op.finished_at = Some(Utc::now());
        })
        .await
    }

    pub async fn fail(&self, id: OperationId, error: impl Into<String>) -> Result<Operation> {
        let error = error.into();
        self.transition(id, |op| {
            op.status = OperationStatus::Error;
            op.error = Some(error);
            op.finished_at = Some(Utc::now());
        })
        .await
    }

    /// Current state of an operation.
    pub async fn get(&self, id: OperationId) -> Result<Operation> {
        self.operations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))
    }

    /// Wait until the operation reaches a terminal status.
    ///
    /// Fails with `OperationNotFound` if the operation was evicted first.
    pub async fn wait(&self, id: OperationId) -> Result<Operation> {
        let mut changes = self.changes.subscribe();
        loop {
            let operation = self.get(id).await?;
            if operation.status.is_terminal() {
                return Ok(operation);
            }
            changes
                .changed()
                .await
                .map_err(|_| Error::Internal("operation tracker dropped".to_string()))?;
        }
    }

    async fn transition(
        &self,
        id: OperationId,
        apply: impl FnOnce(&mut Operation),
    ) -> Result<Operation> {
        let updated = {
            let mut operations = self.operations.write().await;
            let operation = operations
                .get_mut(&id)
                .ok_or_else(|| Error::OperationNotFound(id.to_string()))?;
            if operation.status.is_terminal() {
                return Err(Error::InvalidRequest(format!(
                    "operation {id} already finished"
                )));
            }
            apply(operation);
            operation.clone()
        };
        debug!(operation = %id, status = ?updated.status, "Operation updated");
        self.notify();
        Ok(updated)
    }

    fn evict(&self, operations: &mut HashMap<OperationId, Operation>) {
        let before = operations.len();
        let now = Utc::now();
        let ttl = self.retention.ttl;
        operations.retain(|_, op| match op.finished_at {
            // A finish time ahead of the clock counts as fresh.
            Some(finished) => match (now - finished).to_std() {
                Ok(age) => age < ttl,
                Err(_) => true,
            },
            None => true,
        });

        let mut finished: Vec<(DateTime<Utc>, OperationId)> = operations
            .values()
            .filter_map(|op| op.finished_at.map(|at| (at, op.id)))
            .collect();
        if finished.len() > self.retention.max_finished {
            finished.sort_by_key(|(at, _)| *at);
            let excess = finished.len() - self.retention.max_finished;
            for (_, id) in &finished[..excess] {
                operations.remove(id);
            }
        }

        let evicted = before - operations.len();
        if evicted > 0 {
            debug!(evicted, "Evicted finished operations");
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}
