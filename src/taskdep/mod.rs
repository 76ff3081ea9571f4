// src/taskdep/mod.rs

//! Subtask -> dependency adapter.
//!
//! A task spawned with [`after`] waits until each listed task has sent its
//! outputs. Completion is observed as a `SentOutputs` event on the bus.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use crate::deps::{DependencyId, Deps};
use crate::depot;
use crate::errors::Result;
use crate::kernel::{BeforeScheduled, Plugin, SpawnContext, SpawnOption, TaskId, option};
use crate::shutdown::Shutdown;
use crate::status::{StatusStore, TaskEvent, TaskStatus, event_task};
use crate::store::{Bus, Event, KeyValue};

pub const DATA_KEY: &str = "taskdep";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskdepData {
    pub subtasks: Vec<TaskId>,
}

/// Make the spawning task wait for every task in `ids` to complete.
pub fn after(ids: impl IntoIterator<Item = TaskId>) -> SpawnOption {
    let ids: Vec<_> = ids.into_iter().collect();
    option(move |ctx| {
        ctx.data_mut()
            .get_or_default::<TaskdepData>(DATA_KEY)?
            .subtasks
            .extend(ids);
        Ok(())
    })
}

pub struct TaskdepManager {
    deps: Arc<dyn Deps>,
    task2dep: Arc<dyn KeyValue<DependencyId>>,
    statuses: Option<StatusStore>,
}

impl TaskdepManager {
    pub fn new(deps: Arc<dyn Deps>, task2dep: Arc<dyn KeyValue<DependencyId>>) -> Self {
        Self {
            deps,
            task2dep,
            statuses: None,
        }
    }

    /// Consult task statuses when a subtask is first referenced, so a
    /// subtask that completed earlier does not leave the dependency
    /// unresolved forever.
    pub fn with_statuses(mut self, statuses: StatusStore) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Dependency standing for `task`, created on first reference.
    pub async fn subtask_dependency(&self, task: &str) -> Result<DependencyId> {
        match self.task2dep.get(task).await {
            Ok(dependency) => return Ok(dependency),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let candidate = self.deps.new_dependency();
        let (dependency, inserted) = self.task2dep.get_or_set(task, candidate.id).await?;
        if inserted {
            debug!(task, dependency = %dependency, "subtask mapped to dependency");
        }

        if let Some(statuses) = &self.statuses {
            match statuses.get(task).await {
                Ok(TaskStatus::Complete) => self.deps.resolve(&dependency).await?,
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(dependency)
    }

    /// Resolve the dependency mapped to `task`. `false` if nothing waits on it.
    ///
    /// With statuses wired, `task` is recorded `Complete` before the mapping
    /// is read. A reference racing this call either finds the mapping here
    /// or sees `Complete` in [`TaskdepManager::subtask_dependency`].
    pub async fn resolve_task(&self, task: &str) -> Result<bool> {
        if let Some(statuses) = &self.statuses {
            statuses.advance(task, TaskStatus::Complete).await?;
        }
        let dependency = match self.task2dep.get(task).await {
            Ok(dependency) => dependency,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };
        self.deps.resolve(&dependency).await?;
        Ok(true)
    }
}

pub struct TaskdepPlugin {
    manager: Arc<TaskdepManager>,
}

impl TaskdepPlugin {
    pub fn new(manager: Arc<TaskdepManager>) -> Self {
        Self { manager }
    }
}

impl Plugin for TaskdepPlugin {
    fn name(&self) -> &str {
        "taskdep"
    }

    fn as_before_scheduled(&self) -> Option<&dyn BeforeScheduled> {
        Some(self)
    }
}

#[async_trait]
impl BeforeScheduled for TaskdepPlugin {
    async fn before_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        let subtasks = match ctx.data().get::<TaskdepData>(DATA_KEY)? {
            Some(data) => data.subtasks.clone(),
            None => return Ok(()),
        };

        let mut dependencies = Vec::with_capacity(subtasks.len());
        for subtask in &subtasks {
            dependencies.push(self.manager.subtask_dependency(subtask).await?);
        }
        depot::push_dependencies(ctx, dependencies)
    }
}

/// Resolves subtask dependencies from `SentOutputs` events.
pub struct TaskdepListener {
    manager: Arc<TaskdepManager>,
    bus: Arc<dyn Bus>,
    topic: String,
}

impl TaskdepListener {
    pub fn new(manager: Arc<TaskdepManager>, bus: Arc<dyn Bus>, topic: impl Into<String>) -> Self {
        Self {
            manager,
            bus,
            topic: topic.into(),
        }
    }

    pub async fn subscribe(&self) -> Result<BoxStream<'static, Event>> {
        self.bus.listen(std::slice::from_ref(&self.topic)).await
    }

    /// Handle one bus event; only `SentOutputs` matters.
    pub async fn handle(&self, event: &Event) -> Result<bool> {
        if event.name != TaskEvent::SentOutputs.as_str() {
            return Ok(false);
        }
        let task = event_task(event)?;
        self.manager.resolve_task(&task).await
    }

    pub async fn run(self, mut events: BoxStream<'static, Event>, mut shutdown: Shutdown) {
        info!(topic = %self.topic, "taskdep listener started");

        loop {
            let event = tokio::select! {
                _ = shutdown.wait() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Err(err) = self.handle(&event).await {
                warn!(event = %event.name, error = %err, "failed to resolve subtask dependency");
            }
        }

        info!("taskdep listener stopped");
    }
}
