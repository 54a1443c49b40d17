//! Test helper functions and utilities.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::debug;
use weave_core::ascode::{SyncOutcome, SyncRequest};
use weave_core::ports::GitSynchronizer;
use weave_core::{Error, Result};

/// Git collaborator that records requests instead of pushing them.
///
/// Pushes can be held open to observe callers while git work is still
/// in flight.
pub struct FakeGitSynchronizer {
    requests: Mutex<Vec<SyncRequest>>,
    failing: AtomicBool,
    held: watch::Sender<bool>,
}

impl FakeGitSynchronizer {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            requests: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            held,
        }
    }

    /// Block every push after it is recorded, until [`Self::release_pushes`].
    pub fn hold_pushes(&self) {
        self.held.send_replace(true);
    }

    pub fn release_pushes(&self) {
        self.held.send_replace(false);
    }

    /// Make every following push fail.
    pub fn fail_pushes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeGitSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitSynchronizer for FakeGitSynchronizer {
    async fn synchronize(&self, request: &SyncRequest) -> Result<SyncOutcome> {
        debug!(operation = %request.id, repository = %request.repository, "Fake push");
        self.requests.lock().await.push(request.clone());

        let mut held = self.held.subscribe();
        let released = held.wait_for(|held| !*held).await.is_ok();
        if !released {
            return Err(Error::Synchronization("fake git dropped".to_string()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Synchronization(format!(
                "push to {} rejected",
                request.repository
            )));
        }
        Ok(SyncOutcome {
            repository_url: format!("https://git.example.com/{}", request.repository),
            pull_request_url: Some(format!(
                "https://git.example.com/{}/pull/{}",
                request.repository, request.branch
            )),
        })
    }
}

/// Poll `check` until it yields a value or the timeout expires.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Ok(value);
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
