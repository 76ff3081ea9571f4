// src/deps/scheduler.rs

//! Periodic loops for the batched strategy.
//!
//! Each loop exposes `tick` so tests can step it by hand instead of
//! waiting on the interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::shutdown::Shutdown;
use crate::store::{DepsTransaction, Queue, RelationalStore};

use super::{GroupId, GroupStatus};

/// Moves `Initializing` groups to `Waiting` with their pending count.
pub struct GroupInitializer<S: RelationalStore> {
    store: S,
}

impl<S: RelationalStore> GroupInitializer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// One initialization pass. Returns the groups initialized.
    pub async fn tick(&self) -> Result<Vec<GroupId>> {
        let mut tx = self.store.begin().await?;
        let groups = tx.initialize_groups().await?;
        tx.commit().await?;
        if !groups.is_empty() {
            debug!(count = groups.len(), "initialized groups");
        }
        Ok(groups)
    }

    pub async fn run(self, interval: Duration, mut shutdown: Shutdown) {
        info!(?interval, "group initializer started");
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "group initialization failed; retrying next tick");
                    }
                }
            }
        }
        info!("group initializer stopped");
    }
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTick {
    /// Pushed to the ready queue and marked scheduled.
    pub scheduled: Vec<GroupId>,
    /// Push failed; returned to waiting for the next pass.
    pub deferred: Vec<GroupId>,
}

impl ScheduleTick {
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty() && self.deferred.is_empty()
    }
}

/// Claims ready `Waiting` groups and pushes them onto the ready queue.
///
/// If the final status update of a pass fails, its outcome is kept and
/// applied again at the start of the next pass, so claimed groups do not
/// stay `Scheduling`. The outcome lives in memory only: a process exit
/// between the push and a successful update still strands those groups.
pub struct GroupScheduler<S: RelationalStore> {
    store: S,
    ready: Arc<dyn Queue<GroupId>>,
    batch_size: usize,
    unsettled: Mutex<ScheduleTick>,
}

impl<S: RelationalStore> GroupScheduler<S> {
    pub fn new(store: S, ready: Arc<dyn Queue<GroupId>>, batch_size: usize) -> Self {
        Self {
            store,
            ready,
            batch_size: batch_size.max(1),
            unsettled: Mutex::new(ScheduleTick::default()),
        }
    }

    /// One scheduling pass over at most `batch_size` groups.
    ///
    /// Claiming and the final status update run in separate transactions,
    /// so a group is never pushed while its `Scheduling` claim is
    /// uncommitted.
    pub async fn tick(&self) -> Result<ScheduleTick> {
        let mut unsettled = self.unsettled.lock().await;
        if !unsettled.is_empty() {
            self.settle(&unsettled).await?;
            debug!(
                scheduled = unsettled.scheduled.len(),
                deferred = unsettled.deferred.len(),
                "settled groups from an earlier pass"
            );
            *unsettled = ScheduleTick::default();
        }

        let claimed = {
            let mut tx = self.store.begin().await?;
            let claimed = tx.claim_ready(self.batch_size).await?;
            tx.commit().await?;
            claimed
        };

        let mut outcome = ScheduleTick::default();
        for group in claimed {
            match self.ready.write(vec![group.clone()]).await {
                Ok(()) => outcome.scheduled.push(group),
                Err(err) => {
                    warn!(group = %group, error = %err, "ready push failed; deferring group");
                    outcome.deferred.push(group);
                }
            }
        }

        if outcome.is_empty() {
            return Ok(outcome);
        }

        if let Err(err) = self.settle(&outcome).await {
            warn!(
                groups = outcome.scheduled.len() + outcome.deferred.len(),
                error = %err,
                "status update failed; retrying next pass"
            );
            *unsettled = outcome;
            return Err(err);
        }

        debug!(
            scheduled = outcome.scheduled.len(),
            deferred = outcome.deferred.len(),
            "scheduling pass finished"
        );
        Ok(outcome)
    }

    async fn settle(&self, outcome: &ScheduleTick) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.set_status(&outcome.scheduled, GroupStatus::Scheduled)
            .await?;
        tx.set_status(&outcome.deferred, GroupStatus::Waiting).await?;
        tx.commit().await
    }

    pub async fn run(self, interval: Duration, mut shutdown: Shutdown) {
        info!(?interval, batch_size = self.batch_size, "group scheduler started");
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "group scheduling failed; retrying next tick");
                    }
                }
            }
        }
        info!("group scheduler stopped");
    }
}
