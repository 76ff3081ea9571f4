// src/deps/manager.rs

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{EngineError, Result};
use crate::store::{Delivery, DepsTransaction, Queue, RelationalStore};
use crate::types::ResolveStrategy;

use super::scheduler::{GroupInitializer, GroupScheduler};
use super::{Dependency, DependencyId, Deps, Group, GroupHook, GroupId, GroupStatus, new_id};

/// [`Deps`] implementation over a [`RelationalStore`] and a ready queue.
pub struct DependencyManager<S: RelationalStore> {
    store: S,
    ready: Arc<dyn Queue<GroupId>>,
    strategy: ResolveStrategy,
}

impl<S: RelationalStore> DependencyManager<S> {
    pub fn new(store: S, ready: Arc<dyn Queue<GroupId>>, strategy: ResolveStrategy) -> Self {
        Self {
            store,
            ready,
            strategy,
        }
    }

    pub fn strategy(&self) -> ResolveStrategy {
        self.strategy
    }

    /// Background loop computing pending counts of new batched groups.
    pub fn initializer(&self) -> GroupInitializer<S> {
        GroupInitializer::new(self.store.clone())
    }

    /// Background loop pushing ready batched groups onto the ready queue.
    pub fn scheduler(&self, batch_size: usize) -> GroupScheduler<S> {
        GroupScheduler::new(self.store.clone(), Arc::clone(&self.ready), batch_size)
    }
}

fn distinct(ids: &[DependencyId]) -> Vec<DependencyId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl<S: RelationalStore> Deps for DependencyManager<S> {
    async fn make_group_with(
        &self,
        dependencies: &[DependencyId],
        on_created: Option<GroupHook>,
    ) -> Result<GroupId> {
        let members = distinct(dependencies);
        let group = new_id();
        let mut tx = self.store.begin().await?;

        match self.strategy {
            ResolveStrategy::Instant => {
                let resolved = tx.count_resolved(&members).await?;
                let pending = (members.len() - resolved) as i64;
                tx.insert_group(&group, pending, GroupStatus::Waiting).await?;
                tx.insert_memberships(&group, &members).await?;

                if let Some(hook) = on_created {
                    hook(group.clone()).await?;
                }

                if pending == 0 {
                    self.ready.write(vec![group.clone()]).await?;
                    tx.set_status(std::slice::from_ref(&group), GroupStatus::Scheduled)
                        .await?;
                }
                tx.commit().await?;
                debug!(group = %group, members = members.len(), pending, "group created");
            }
            ResolveStrategy::Batched => {
                tx.insert_group(&group, -1, GroupStatus::Initializing).await?;
                tx.insert_memberships(&group, &members).await?;

                if let Some(hook) = on_created {
                    hook(group.clone()).await?;
                }
                tx.commit().await?;
                debug!(group = %group, "group created; awaiting initialization");
            }
        }

        Ok(group)
    }

    async fn resolve(&self, dependency: &str) -> Result<()> {
        let mut tx = self.store.begin().await?;

        if tx.mark_resolved(dependency).await? {
            debug!(dependency, "dependency already resolved");
            return tx.rollback().await;
        }

        let zeroed = tx.decrement_pending(dependency).await?;
        if self.strategy == ResolveStrategy::Instant && !zeroed.is_empty() {
            debug!(dependency, ready = ?zeroed, "groups became ready");
            self.ready.write(zeroed.clone()).await?;
            tx.set_status(&zeroed, GroupStatus::Scheduled).await?;
        }

        tx.commit().await
    }

    async fn dependency(&self, id: &str) -> Result<Dependency> {
        let mut tx = self.store.begin().await?;
        let found = tx.dependency(id).await?;
        tx.rollback().await?;
        found.ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn group(&self, id: &str) -> Result<Group> {
        let mut tx = self.store.begin().await?;
        let found = tx.group(id).await?;
        tx.rollback().await?;
        found.ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn next_ready(&self) -> Result<Delivery<GroupId>> {
        self.ready.take().await
    }
}
