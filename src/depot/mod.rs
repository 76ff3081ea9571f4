// src/depot/mod.rs

//! The depot holds spawned tasks back until their dependencies resolve.
//!
//! On schedule it creates a dependency group for the task and binds
//! `group -> task`. Its dispatch loop reads ready group ids, looks up the
//! bound task and forwards it to the downstream task queue.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::DepotConfig;
use crate::deps::{DependencyId, Deps, GroupHook, GroupId};
use crate::errors::{EngineError, Result};
use crate::kernel::{SpawnContext, SpawnOption, TaskId, TaskInputs, option};
use crate::shutdown::Shutdown;
use crate::store::{Bimap, Delivery, Queue};
use crate::types::{BindingMode, BindingRetention, DispatchFailurePolicy};

/// Plugin-data key under which spawn options collect dependency ids.
pub const DATA_KEY: &str = "dependencies";

/// Dependencies the task being spawned must wait for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepotData {
    pub dependencies: Vec<DependencyId>,
}

/// Append `id` to the spawning task's dependencies.
pub fn dependency(id: impl Into<DependencyId>) -> SpawnOption {
    let id = id.into();
    option(move |ctx| push_dependencies(ctx, std::iter::once(id)))
}

/// Append several ids at once.
pub fn dependencies(ids: impl IntoIterator<Item = DependencyId>) -> SpawnOption {
    let ids: Vec<_> = ids.into_iter().collect();
    option(move |ctx| push_dependencies(ctx, ids))
}

/// Add dependency ids to the context. Plugins call this from their
/// `BeforeScheduled` hooks.
pub fn push_dependencies(
    ctx: &mut SpawnContext<'_>,
    ids: impl IntoIterator<Item = DependencyId>,
) -> Result<()> {
    let data = ctx.data_mut().get_or_default::<DepotData>(DATA_KEY)?;
    data.dependencies.extend(ids);
    Ok(())
}

/// What happened to one ready signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Forwarded { group: GroupId, task: TaskId },
    RolledBack { group: GroupId },
    Dropped { group: GroupId },
}

pub struct Depot {
    deps: Arc<dyn Deps>,
    bindings: Arc<dyn Bimap>,
    outputs: Arc<dyn Queue<TaskId>>,
    config: DepotConfig,
}

impl Depot {
    pub fn new(
        deps: Arc<dyn Deps>,
        bindings: Arc<dyn Bimap>,
        outputs: Arc<dyn Queue<TaskId>>,
        config: DepotConfig,
    ) -> Self {
        Self {
            deps,
            bindings,
            outputs,
            config,
        }
    }

    pub fn deps(&self) -> &Arc<dyn Deps> {
        &self.deps
    }

    pub fn bindings(&self) -> &Arc<dyn Bimap> {
        &self.bindings
    }

    /// Create the dependency group for `task` and bind it.
    pub async fn write(&self, task: &str, dependencies: &[DependencyId]) -> Result<GroupId> {
        let group = match self.config.binding {
            BindingMode::Separate => {
                let group = self.deps.make_group(dependencies).await?;
                self.bindings.save(&group, task).await.map_err(|err| {
                    EngineError::Store(format!(
                        "group {group} created but binding to task {task} failed: {err}"
                    ))
                })?;
                group
            }
            BindingMode::Transactional => {
                let bindings = Arc::clone(&self.bindings);
                let task = task.to_string();
                let hook: GroupHook = Box::new(move |group: GroupId| {
                    async move { bindings.save(&group, &task).await }.boxed()
                });
                self.deps.make_group_with(dependencies, Some(hook)).await?
            }
        };
        debug!(task, group = %group, dependencies = dependencies.len(), "task bound to group");
        Ok(group)
    }

    /// Handle one ready signal according to the configured policy.
    pub async fn dispatch(&self, delivery: Delivery<GroupId>) -> Result<Dispatch> {
        let group = delivery.item().clone();

        match self.forward(&group).await {
            Ok(task) => {
                delivery.commit()?;
                if self.config.binding_retention == BindingRetention::Release {
                    if let Err(err) = self.bindings.delete_by_key(&group).await {
                        warn!(group = %group, error = %err, "failed to release binding");
                    }
                }
                debug!(group = %group, task = %task, "task dispatched");
                Ok(Dispatch::Forwarded { group, task })
            }
            Err(err) => match self.config.on_dispatch_failure {
                DispatchFailurePolicy::Rollback => {
                    warn!(group = %group, error = %err, "dispatch failed; rolling back");
                    delivery.rollback()?;
                    Ok(Dispatch::RolledBack { group })
                }
                DispatchFailurePolicy::Drop => {
                    warn!(group = %group, error = %err, "dispatch failed; dropping ready signal");
                    delivery.commit()?;
                    Ok(Dispatch::Dropped { group })
                }
            },
        }
    }

    async fn forward(&self, group: &str) -> Result<TaskId> {
        let task = self.bindings.by_key(group).await?;
        self.outputs.write(vec![task.clone()]).await?;
        Ok(task)
    }

    /// Dispatch loop. Runs until shutdown or until the ready queue closes.
    pub async fn process(&self, mut shutdown: Shutdown) {
        info!("depot dispatch loop started");
        loop {
            let delivery = tokio::select! {
                _ = shutdown.wait() => break,
                next = self.deps.next_ready() => next,
            };

            match delivery {
                Ok(delivery) => match self.dispatch(delivery).await {
                    Ok(Dispatch::RolledBack { .. }) => {
                        if shutdown.sleep(self.config.retry_backoff).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to settle ready signal"),
                },
                Err(EngineError::Closed(what)) => {
                    info!(%what, "ready queue closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read ready queue");
                    if shutdown.sleep(self.config.retry_backoff).await {
                        break;
                    }
                }
            }
        }
        info!("depot dispatch loop stopped");
    }
}

#[async_trait]
impl TaskInputs for Depot {
    async fn schedule(&self, ctx: &SpawnContext<'_>) -> Result<()> {
        let dependencies = ctx
            .data()
            .get::<DepotData>(DATA_KEY)?
            .map(|data| data.dependencies.clone())
            .unwrap_or_default();
        self.write(&ctx.task().id, &dependencies).await?;
        Ok(())
    }
}
