// src/status/mod.rs

//! Task status tracking.
//!
//! The kernel hooks record `Initialized` and `Scheduled`; executors report
//! the rest as bus events on the configured topic, with the task id as
//! event data.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{EngineError, Result};
use crate::kernel::{AfterInitialized, AfterScheduled, Plugin, SpawnContext, TaskId};
use crate::shutdown::Shutdown;
use crate::store::{Bus, Event, KeyValue};

/// Lifecycle position of a task. Ordered: a status never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Initialized,
    Scheduled,
    Executing,
    Executed,
    Complete,
}

/// Executor-side lifecycle events carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    ReceivedTask,
    ExecutedTask,
    SentOutputs,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::ReceivedTask => "ReceivedTask",
            TaskEvent::ExecutedTask => "ExecutedTask",
            TaskEvent::SentOutputs => "SentOutputs",
        }
    }

    /// Status a task reaches when this event is observed.
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskEvent::ReceivedTask => TaskStatus::Executing,
            TaskEvent::ExecutedTask => TaskStatus::Executed,
            TaskEvent::SentOutputs => TaskStatus::Complete,
        }
    }

    /// Bus event announcing this for `task` on `topic`.
    pub fn event(&self, topic: &str, task: &str) -> Event {
        Event::new(topic, self.as_str(), task.as_bytes())
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskEvent {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ReceivedTask" => Ok(TaskEvent::ReceivedTask),
            "ExecutedTask" => Ok(TaskEvent::ExecutedTask),
            "SentOutputs" => Ok(TaskEvent::SentOutputs),
            other => Err(EngineError::NotFound(format!("task event '{other}'"))),
        }
    }
}

/// Decode the task id carried by a lifecycle event.
pub fn event_task(event: &Event) -> Result<TaskId> {
    String::from_utf8(event.data.clone())
        .map_err(|err| EngineError::Store(format!("event data is not a task id: {err}")))
}

/// Status table with forward-only updates.
#[derive(Clone)]
pub struct StatusStore {
    db: Arc<dyn KeyValue<TaskStatus>>,
}

impl StatusStore {
    pub fn new(db: Arc<dyn KeyValue<TaskStatus>>) -> Self {
        Self { db }
    }

    pub async fn get(&self, task: &str) -> Result<TaskStatus> {
        self.db.get(task).await
    }

    /// Move `task` to `status` unless it is already there or further.
    ///
    /// Concurrent advances never move a task backwards: each write is a
    /// compare-and-set against the status just read, retried on conflict.
    /// Returns whether this call changed the stored status.
    pub async fn advance(&self, task: &str, status: TaskStatus) -> Result<bool> {
        let (mut current, inserted) = self.db.get_or_set(task, status).await?;
        if inserted {
            return Ok(true);
        }
        loop {
            if current >= status {
                return Ok(false);
            }
            if self.db.compare_and_set(task, &current, status).await? {
                return Ok(true);
            }
            current = self.db.get(task).await?;
        }
    }
}

pub struct StatusPlugin {
    store: StatusStore,
}

impl StatusPlugin {
    pub fn new(store: StatusStore) -> Self {
        Self { store }
    }
}

impl Plugin for StatusPlugin {
    fn name(&self) -> &str {
        "status"
    }

    fn as_after_initialized(&self) -> Option<&dyn AfterInitialized> {
        Some(self)
    }

    fn as_after_scheduled(&self) -> Option<&dyn AfterScheduled> {
        Some(self)
    }
}

#[async_trait]
impl AfterInitialized for StatusPlugin {
    async fn after_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.store
            .advance(&ctx.task().id, TaskStatus::Initialized)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AfterScheduled for StatusPlugin {
    async fn after_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.store
            .advance(&ctx.task().id, TaskStatus::Scheduled)
            .await?;
        Ok(())
    }
}

/// Applies executor lifecycle events to the status table.
pub struct StatusUpdater {
    store: StatusStore,
    bus: Arc<dyn Bus>,
    topic: String,
}

impl StatusUpdater {
    pub fn new(store: StatusStore, bus: Arc<dyn Bus>, topic: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            topic: topic.into(),
        }
    }

    /// Apply one event. Unrelated event names are ignored.
    pub async fn apply(&self, event: &Event) -> Result<()> {
        let Ok(kind) = event.name.parse::<TaskEvent>() else {
            return Ok(());
        };
        let task = event_task(event)?;
        if self.store.advance(&task, kind.status()).await? {
            debug!(task = %task, event = %kind, "task status advanced");
        }
        Ok(())
    }

    /// Subscribe to the events topic. Events published from here on are
    /// seen by [`StatusUpdater::run`].
    pub async fn subscribe(&self) -> Result<BoxStream<'static, Event>> {
        self.bus.listen(std::slice::from_ref(&self.topic)).await
    }

    pub async fn run(self, mut events: BoxStream<'static, Event>, mut shutdown: Shutdown) {
        info!(topic = %self.topic, "status updater started");

        loop {
            let event = tokio::select! {
                _ = shutdown.wait() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Err(err) = self.apply(&event).await {
                warn!(event = %event.name, error = %err, "failed to apply status event");
            }
        }

        info!("status updater stopped");
    }
}
