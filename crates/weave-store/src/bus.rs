//! In-process event bus over a tokio broadcast channel.

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use weave_core::events::Event;
use weave_core::ports::{EventBus, EventStream};
use weave_core::{Error, Result};

const DEFAULT_CAPACITY: usize = 1024;

/// Event bus delivering to subscribers of the same process.
///
/// Subjects use NATS-style wildcards: `*` matches one token, `>` matches
/// every remaining token.
#[derive(Clone)]
pub struct MemoryEventBus {
    sender: broadcast::Sender<Event>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        let subject = event.subject();
        debug!("Publishing event to {}", subject);
        // No receiver is not an error: nobody is listening yet.
        if self.sender.send(event).is_err() {
            debug!(subject = %subject, "No subscriber for event");
        }
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<EventStream> {
        validate_pattern(pattern)?;
        debug!("Subscribing to pattern: {}", pattern);

        let receiver = self.sender.subscribe();
        let pattern = pattern.to_string();
        let stream = stream::unfold((receiver, pattern), |(mut receiver, pattern)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if subject_matches(&pattern, &event.subject()) => {
                        return Some((Ok(event), (receiver, pattern)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, pattern = %pattern, "Subscriber lagged behind");
                        let err = Error::EventBus(format!("subscriber lagged, {skipped} events lost"));
                        return Some((Err(err), (receiver, pattern)));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

fn validate_pattern(pattern: &str) -> Result<()> {
    let tokens: Vec<&str> = pattern.split('.').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(Error::EventBus(format!("invalid subject pattern '{pattern}'")));
    }
    if let Some(pos) = tokens.iter().position(|t| *t == ">")
        && pos != tokens.len() - 1
    {
        return Err(Error::EventBus(format!(
            "'>' must be the last token of '{pattern}'"
        )));
    }
    Ok(())
}

/// NATS subject matching.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    for token in pattern.split('.') {
        match token {
            ">" => return subject_tokens.next().is_some(),
            "*" => {
                if subject_tokens.next().is_none() {
                    return false;
                }
            }
            literal => {
                if subject_tokens.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    subject_tokens.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;
    use weave_core::ascode::OperationKind;
    use weave_core::events::AsCodeOperationQueuedPayload;
    use weave_core::ids::{OperationId, ProjectKey};

    fn queued(workflow: &str) -> Event {
        Event::AsCodeOperationQueued(AsCodeOperationQueuedPayload {
            operation_id: OperationId::new(),
            kind: OperationKind::Update,
            project: ProjectKey::new("PROJ"),
            workflow: workflow.to_string(),
            repository: "org/repo".to_string(),
            branch: "main".to_string(),
            queued_at: Utc::now(),
        })
    }

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches("ascode.>", "ascode.queued.ope_1"));
        assert!(subject_matches("ascode.*.ope_1", "ascode.failed.ope_1"));
        assert!(subject_matches("workflow.imported.PROJ.build", "workflow.imported.PROJ.build"));
        assert!(!subject_matches("ascode.>", "ascode"));
        assert!(!subject_matches("ascode.*", "ascode.queued.ope_1"));
        assert!(!subject_matches("workflow.>", "ascode.queued.ope_1"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(validate_pattern("ascode.>.x").is_err());
        assert!(validate_pattern("ascode..x").is_err());
        assert!(validate_pattern("ascode.*").is_ok());
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscriber() {
        let bus = MemoryEventBus::new();
        let mut all = bus.subscribe("ascode.>").await.unwrap();
        let mut none = bus.subscribe("workflow.>").await.unwrap();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(queued("build")).await.unwrap();

        let event = all.next().await.unwrap().unwrap();
        assert!(event.subject().starts_with("ascode.queued."));

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), none.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_ok() {
        let bus = MemoryEventBus::new();
        assert!(bus.publish(queued("build")).await.is_ok());
    }
}
