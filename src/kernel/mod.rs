// src/kernel/mod.rs

//! Spawn pipeline and plugin host.
//!
//! [`Kernel::spawn`] turns a [`TaskSpec`] into a persisted [`Task`], runs
//! the plugin hooks around persistence and scheduling, and hands the task
//! to a [`TaskInputs`] sink (the depot in a full engine, a plain queue in
//! the simplest one).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::store::{KeyValue, Queue};

pub mod context;
pub mod plugin;
pub mod task;

pub use context::{PluginData, SpawnContext, SpawnLog};
pub use plugin::{
    AfterInitialized, AfterScheduled, BeforeInitialized, BeforeScheduled, Initialize, Plugin,
};
pub use task::{SpawnOption, Task, TaskId, TaskSpec, option};

/// Where a spawned task goes once every `BeforeScheduled` hook has run.
#[async_trait]
pub trait TaskInputs: Send + Sync {
    async fn schedule(&self, ctx: &SpawnContext<'_>) -> Result<()>;
}

/// [`TaskInputs`] that pushes the task id straight onto a queue.
pub struct QueueInputs {
    queue: Arc<dyn Queue<TaskId>>,
}

impl QueueInputs {
    pub fn new(queue: Arc<dyn Queue<TaskId>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl TaskInputs for QueueInputs {
    async fn schedule(&self, ctx: &SpawnContext<'_>) -> Result<()> {
        self.queue.write(vec![ctx.task().id.clone()]).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnResult {
    pub task: TaskId,
    pub log: SpawnLog,
}

pub struct Kernel {
    tasks: Arc<dyn KeyValue<Task>>,
    inputs: Arc<dyn TaskInputs>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("Kernel")
            .field("plugins", &names)
            .finish_non_exhaustive()
    }
}

impl Kernel {
    pub fn new(tasks: Arc<dyn KeyValue<Task>>, inputs: Arc<dyn TaskInputs>) -> Self {
        Self {
            tasks,
            inputs,
            plugins: Vec::new(),
        }
    }

    /// Add a plugin. Its `Initialize` hook runs first; an error leaves the
    /// plugin unregistered.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        if let Some(init) = plugin.as_initialize() {
            init.initialize(self)?;
        }
        debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Load a persisted task.
    pub async fn task(&self, id: &str) -> Result<Task> {
        self.tasks.get(id).await
    }

    /// Spawn a top-level task.
    pub async fn spawn(&self, spec: TaskSpec) -> Result<SpawnResult> {
        let (result, ctx) = self.run_pipeline(spec).await;
        let log = ctx.into_log();
        result.map(|task| SpawnResult { task, log })
    }

    /// Spawn a task from inside another spawn's hook.
    ///
    /// The child's log is merged into `parent` whether or not the child
    /// spawn succeeded.
    pub async fn spawn_within(
        &self,
        parent: &mut SpawnContext<'_>,
        spec: TaskSpec,
    ) -> Result<SpawnResult> {
        let (result, ctx) = self.run_pipeline(spec).await;
        let log = ctx.into_log();
        parent.log_mut().merge(&log);
        result.map(|task| SpawnResult { task, log })
    }

    async fn run_pipeline(&self, spec: TaskSpec) -> (Result<TaskId>, SpawnContext<'_>) {
        let TaskSpec {
            task_type,
            data,
            options,
        } = spec;
        let task = Task {
            id: crate::deps::new_id(),
            task_type,
            data,
        };
        let mut ctx = SpawnContext::new(self, task);
        let result = self.drive(&mut ctx, options).await;
        (result, ctx)
    }

    async fn drive(&self, ctx: &mut SpawnContext<'_>, options: Vec<SpawnOption>) -> Result<TaskId> {
        let id = ctx.task().id.clone();

        for option in options {
            option(&mut *ctx)?;
        }

        for plugin in &self.plugins {
            if let Some(hook) = plugin.as_before_initialized() {
                hook.before_initialized(ctx).await?;
            }
        }

        self.tasks.set(&id, ctx.task().clone()).await?;
        debug!(task = %id, task_type = %ctx.task().task_type, "task initialized");

        for plugin in &self.plugins {
            if let Some(hook) = plugin.as_after_initialized() {
                if let Err(err) = hook.after_initialized(ctx).await {
                    warn!(task = %id, plugin = plugin.name(), error = %err, "after-initialized hook failed");
                }
            }
        }

        for plugin in &self.plugins {
            if let Some(hook) = plugin.as_before_scheduled() {
                hook.before_scheduled(ctx).await?;
            }
        }

        self.inputs.schedule(ctx).await?;
        debug!(task = %id, "task scheduled");

        for plugin in &self.plugins {
            if let Some(hook) = plugin.as_after_scheduled() {
                if let Err(err) = hook.after_scheduled(ctx).await {
                    warn!(task = %id, plugin = plugin.name(), error = %err, "after-scheduled hook failed");
                }
            }
        }

        ctx.log_mut().spawned.push(id.clone());
        Ok(id)
    }
}
