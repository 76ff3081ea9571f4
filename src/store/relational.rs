// src/store/relational.rs

//! Transactional tables behind the dependency store.
//!
//! The schema has three relations:
//!
//! - `dependencies(id, resolved)`
//! - `groups(id, pending, status)`
//! - `memberships(dependency, group)`, primary key on the pair
//!
//! [`DepsTransaction`] exposes the handful of statements the dependency
//! manager and the batched scheduler need. A SQL adapter maps each method
//! onto one statement inside a database transaction. Dropping a transaction
//! without calling [`DepsTransaction::commit`] must discard its writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::deps::{Dependency, DependencyId, Group, GroupId, GroupStatus};
use crate::errors::{EngineError, Result};

#[async_trait]
pub trait RelationalStore: Clone + Send + Sync + 'static {
    type Tx: DepsTransaction;

    async fn begin(&self) -> Result<Self::Tx>;
}

#[async_trait]
pub trait DepsTransaction: Send + Sized {
    async fn insert_group(&mut self, id: &str, pending: i64, status: GroupStatus) -> Result<()>;

    async fn insert_memberships(&mut self, group: &str, dependencies: &[DependencyId]) -> Result<()>;

    /// How many of `dependencies` are recorded as resolved.
    async fn count_resolved(&mut self, dependencies: &[DependencyId]) -> Result<usize>;

    /// Upsert `dependency` as resolved. Returns whether it already was.
    async fn mark_resolved(&mut self, dependency: &str) -> Result<bool>;

    /// Decrement `pending` on every non-initializing group containing
    /// `dependency`. Returns the groups that reached zero.
    async fn decrement_pending(&mut self, dependency: &str) -> Result<Vec<GroupId>>;

    /// Compute `pending` for every initializing group and move it to
    /// waiting. Returns the groups touched.
    async fn initialize_groups(&mut self) -> Result<Vec<GroupId>>;

    /// Move up to `limit` waiting groups with zero pending to scheduling.
    async fn claim_ready(&mut self, limit: usize) -> Result<Vec<GroupId>>;

    async fn set_status(&mut self, groups: &[GroupId], status: GroupStatus) -> Result<()>;

    async fn dependency(&mut self, id: &str) -> Result<Option<Dependency>>;

    async fn group(&mut self, id: &str) -> Result<Option<Group>>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct GroupRow {
    pending: i64,
    status: GroupStatus,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    dependencies: HashMap<DependencyId, bool>,
    groups: BTreeMap<GroupId, GroupRow>,
    by_dependency: BTreeSet<(DependencyId, GroupId)>,
    by_group: BTreeSet<(GroupId, DependencyId)>,
}

impl Tables {
    fn groups_of(&self, dependency: &str) -> Vec<GroupId> {
        self.by_dependency
            .range((dependency.to_string(), String::new())..)
            .take_while(|(dep, _)| dep == dependency)
            .map(|(_, group)| group.clone())
            .collect()
    }

    fn members_of(&self, group: &str) -> Vec<DependencyId> {
        self.by_group
            .range((group.to_string(), String::new())..)
            .take_while(|(g, _)| g == group)
            .map(|(_, dep)| dep.clone())
            .collect()
    }

    fn is_resolved(&self, dependency: &str) -> bool {
        self.dependencies.get(dependency).copied().unwrap_or(false)
    }
}

/// In-memory [`RelationalStore`].
///
/// Transactions are serialized: `begin` takes the table lock and works on a
/// private copy, `commit` publishes the copy.
#[derive(Clone, Default)]
pub struct MemoryRelational {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRelational {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for MemoryRelational {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl DepsTransaction for MemoryTx {
    async fn insert_group(&mut self, id: &str, pending: i64, status: GroupStatus) -> Result<()> {
        if self.working.groups.contains_key(id) {
            return Err(EngineError::Store(format!("duplicate group id '{id}'")));
        }
        self.working
            .groups
            .insert(id.to_string(), GroupRow { pending, status });
        Ok(())
    }

    async fn insert_memberships(&mut self, group: &str, dependencies: &[DependencyId]) -> Result<()> {
        if !self.working.groups.contains_key(group) {
            return Err(EngineError::Store(format!(
                "membership references unknown group '{group}'"
            )));
        }
        for dep in dependencies {
            self.working
                .by_dependency
                .insert((dep.clone(), group.to_string()));
            self.working
                .by_group
                .insert((group.to_string(), dep.clone()));
        }
        Ok(())
    }

    async fn count_resolved(&mut self, dependencies: &[DependencyId]) -> Result<usize> {
        Ok(dependencies
            .iter()
            .filter(|dep| self.working.is_resolved(dep))
            .count())
    }

    async fn mark_resolved(&mut self, dependency: &str) -> Result<bool> {
        let previous = self
            .working
            .dependencies
            .insert(dependency.to_string(), true);
        Ok(previous.unwrap_or(false))
    }

    async fn decrement_pending(&mut self, dependency: &str) -> Result<Vec<GroupId>> {
        let mut zeroed = Vec::new();
        for group in self.working.groups_of(dependency) {
            let Some(row) = self.working.groups.get_mut(&group) else {
                continue;
            };
            if row.status == GroupStatus::Initializing || row.pending <= 0 {
                continue;
            }
            row.pending -= 1;
            if row.pending == 0 {
                zeroed.push(group);
            }
        }
        Ok(zeroed)
    }

    async fn initialize_groups(&mut self) -> Result<Vec<GroupId>> {
        let initializing: Vec<GroupId> = self
            .working
            .groups
            .iter()
            .filter(|(_, row)| row.status == GroupStatus::Initializing)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &initializing {
            let pending = self
                .working
                .members_of(id)
                .iter()
                .filter(|dep| !self.working.is_resolved(dep))
                .count() as i64;
            if let Some(row) = self.working.groups.get_mut(id) {
                row.pending = pending;
                row.status = GroupStatus::Waiting;
            }
        }
        Ok(initializing)
    }

    async fn claim_ready(&mut self, limit: usize) -> Result<Vec<GroupId>> {
        let mut claimed = Vec::new();
        for (id, row) in self.working.groups.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if row.status == GroupStatus::Waiting && row.pending == 0 {
                row.status = GroupStatus::Scheduling;
                claimed.push(id.clone());
            }
        }
        Ok(claimed)
    }

    async fn set_status(&mut self, groups: &[GroupId], status: GroupStatus) -> Result<()> {
        for id in groups {
            match self.working.groups.get_mut(id) {
                Some(row) => row.status = status,
                None => return Err(EngineError::NotFound(id.clone())),
            }
        }
        Ok(())
    }

    async fn dependency(&mut self, id: &str) -> Result<Option<Dependency>> {
        if let Some(resolved) = self.working.dependencies.get(id) {
            return Ok(Some(Dependency {
                id: id.to_string(),
                resolved: *resolved,
            }));
        }
        // Referenced by a group but never resolved: not yet a row of its own.
        if !self.working.groups_of(id).is_empty() {
            return Ok(Some(Dependency {
                id: id.to_string(),
                resolved: false,
            }));
        }
        Ok(None)
    }

    async fn group(&mut self, id: &str) -> Result<Option<Group>> {
        let Some(row) = self.working.groups.get(id) else {
            return Ok(None);
        };
        let dependencies = self
            .working
            .members_of(id)
            .into_iter()
            .map(|dep| Dependency {
                resolved: self.working.is_resolved(&dep),
                id: dep,
            })
            .collect();
        Ok(Some(Group {
            id: id.to_string(),
            pending: row.pending,
            status: row.status,
            dependencies,
        }))
    }

    async fn commit(mut self) -> Result<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
