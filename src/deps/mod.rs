// src/deps/mod.rs

//! Dependency store and group scheduler.
//!
//! A *dependency* is a boolean latch that flips to resolved exactly once.
//! A *group* is a set of dependencies; it becomes ready once all of its
//! members are resolved, and its id is then delivered exactly once on the
//! ready queue.
//!
//! Two resolve strategies are supported (see [`ResolveStrategy`]):
//!
//! - `Instant`: readiness is detected inside `make_group` / `resolve` and the
//!   group id is enqueued in the same transaction.
//! - `Batched`: `make_group` and `resolve` only write; the
//!   [`scheduler::GroupInitializer`] and [`scheduler::GroupScheduler`] loops
//!   compute pending counts and claim ready groups periodically.
//!
//! [`ResolveStrategy`]: crate::types::ResolveStrategy

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::store::Delivery;

pub mod manager;
pub mod scheduler;

pub use manager::DependencyManager;
pub use scheduler::{GroupInitializer, GroupScheduler, ScheduleTick};

pub type DependencyId = String;
pub type GroupId = String;

/// Allocate a fresh globally-unique id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Unresolved members; `-1` until a batched group is initialized.
    pub pending: i64,
    pub status: GroupStatus,
    pub dependencies: Vec<Dependency>,
}

/// Lifecycle of a group.
///
/// `Initializing -> Waiting -> Scheduling -> Scheduled`, with
/// `Scheduling -> Waiting` when the ready push fails. `Initializing` is
/// only used by the batched strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Initializing,
    Waiting,
    Scheduling,
    Scheduled,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Initializing => "initializing",
            GroupStatus::Waiting => "waiting",
            GroupStatus::Scheduling => "scheduling",
            GroupStatus::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initializing" => Ok(GroupStatus::Initializing),
            "waiting" => Ok(GroupStatus::Waiting),
            "scheduling" => Ok(GroupStatus::Scheduling),
            "scheduled" => Ok(GroupStatus::Scheduled),
            other => Err(EngineError::Store(format!("unknown group status '{other}'"))),
        }
    }
}

/// Runs once the group row exists, inside the creating transaction.
///
/// An error aborts group creation.
pub type GroupHook = Box<dyn FnOnce(GroupId) -> BoxFuture<'static, Result<()>> + Send>;

/// Dependency store operations.
#[async_trait]
pub trait Deps: Send + Sync {
    /// Allocate an unresolved dependency. Nothing is persisted until the
    /// id is resolved or joins a group.
    fn new_dependency(&self) -> Dependency {
        Dependency {
            id: new_id(),
            resolved: false,
        }
    }

    /// Create a group over `dependencies` (duplicates collapse).
    async fn make_group(&self, dependencies: &[DependencyId]) -> Result<GroupId> {
        self.make_group_with(dependencies, None).await
    }

    /// Like [`Deps::make_group`], running `on_created` before commit.
    async fn make_group_with(
        &self,
        dependencies: &[DependencyId],
        on_created: Option<GroupHook>,
    ) -> Result<GroupId>;

    /// Mark a dependency resolved. Repeated calls are no-ops.
    async fn resolve(&self, dependency: &str) -> Result<()>;

    async fn dependency(&self, id: &str) -> Result<Dependency>;

    async fn group(&self, id: &str) -> Result<Group>;

    /// Next ready group id. Commit the delivery once it has been handled.
    async fn next_ready(&self) -> Result<Delivery<GroupId>>;
}
