// src/store/bus.rs

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::errors::{EngineError, Result};

/// A named message published on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub name: String,
    pub data: Vec<u8>,
}

impl Event {
    pub fn new(topic: impl Into<String>, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Publish / subscribe event bus.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, event: Event) -> Result<()>;

    /// Subscribe to `topics`. Only events published after the call are seen.
    async fn listen(&self, topics: &[String]) -> Result<BoxStream<'static, Event>>;
}

/// In-process [`Bus`] over a tokio broadcast channel.
///
/// Slow listeners that fall behind by more than `capacity` events skip the
/// missed ones with a warning.
#[derive(Clone)]
pub struct MemoryBus {
    sender: broadcast::Sender<Event>,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, event: Event) -> Result<()> {
        // No receivers is not an error: nobody is listening yet.
        let _ = self.sender.send(event);
        Ok(())
    }

    async fn listen(&self, topics: &[String]) -> Result<BoxStream<'static, Event>> {
        if topics.is_empty() {
            return Err(EngineError::ConfigError(
                "listen requires at least one topic".to_string(),
            ));
        }
        let receiver = self.sender.subscribe();
        let topics = topics.to_vec();

        let events = stream::unfold((receiver, topics), |(mut receiver, topics)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if topics.iter().any(|t| *t == event.topic) => {
                        return Some((event, (receiver, topics)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "bus listener lagged; events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(events))
    }
}
