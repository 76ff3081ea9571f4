#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use taskweave::errors::{EngineError, Result};
use taskweave::future::{FutureId, Resolution, Runner};
use taskweave::kernel::{
    AfterInitialized, AfterScheduled, BeforeInitialized, BeforeScheduled, Plugin, SpawnContext,
    TaskId,
};
use taskweave::store::{Delivery, MemoryQueue, MemoryRelational, Queue, RelationalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeInitialized,
    AfterInitialized,
    BeforeScheduled,
    AfterScheduled,
}

/// What a [`RecordingPlugin`] saw when one of its hooks ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub phase: Phase,
    pub task: TaskId,
    /// Whether the task could be loaded through the kernel.
    pub persisted: bool,
    /// Whether the task id was visible in the observed pool.
    pub in_pool: bool,
}

/// Plugin implementing every spawn hook, recording what each one observes.
pub struct RecordingPlugin {
    name: String,
    pool: Option<MemoryQueue<TaskId>>,
    fail_on: Option<Phase>,
    observations: Arc<Mutex<Vec<Observation>>>,
}

impl RecordingPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pool: None,
            fail_on: None,
            observations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Check the given queue for the task id at every hook.
    pub fn observing(mut self, pool: MemoryQueue<TaskId>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Return an error from the given hook.
    pub fn failing_on(mut self, phase: Phase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.observations().into_iter().map(|o| o.phase).collect()
    }

    async fn record(&self, phase: Phase, ctx: &SpawnContext<'_>) -> Result<()> {
        let task = ctx.task().id.clone();
        let persisted = ctx.kernel().task(&task).await.is_ok();
        let in_pool = self
            .pool
            .as_ref()
            .map(|pool| pool.snapshot().contains(&task))
            .unwrap_or(false);

        self.observations.lock().unwrap().push(Observation {
            phase,
            task,
            persisted,
            in_pool,
        });

        if self.fail_on == Some(phase) {
            return Err(EngineError::Other(anyhow::anyhow!(
                "{} failed on {:?}",
                self.name,
                phase
            )));
        }
        Ok(())
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_before_initialized(&self) -> Option<&dyn BeforeInitialized> {
        Some(self)
    }

    fn as_after_initialized(&self) -> Option<&dyn AfterInitialized> {
        Some(self)
    }

    fn as_before_scheduled(&self) -> Option<&dyn BeforeScheduled> {
        Some(self)
    }

    fn as_after_scheduled(&self) -> Option<&dyn AfterScheduled> {
        Some(self)
    }
}

#[async_trait]
impl BeforeInitialized for RecordingPlugin {
    async fn before_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.record(Phase::BeforeInitialized, ctx).await
    }
}

#[async_trait]
impl AfterInitialized for RecordingPlugin {
    async fn after_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.record(Phase::AfterInitialized, ctx).await
    }
}

#[async_trait]
impl BeforeScheduled for RecordingPlugin {
    async fn before_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.record(Phase::BeforeScheduled, ctx).await
    }
}

#[async_trait]
impl AfterScheduled for RecordingPlugin {
    async fn after_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        self.record(Phase::AfterScheduled, ctx).await
    }
}

/// Runner that counts invocations and remembers the futures it saw.
#[derive(Clone, Default)]
pub struct CountingRunner {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<FutureId>>>,
}

impl CountingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<FutureId> {
        self.seen.lock().unwrap().clone()
    }
}

impl Runner for CountingRunner {
    fn run<'a>(
        &'a self,
        resolution: &'a Resolution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(resolution.future.id.clone());
            Ok(())
        })
    }
}

/// Queue whose next `n` writes fail, for exercising retry paths.
pub struct FlakyQueue<T> {
    inner: MemoryQueue<T>,
    failures: AtomicUsize,
}

impl<T> FlakyQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(inner: MemoryQueue<T>) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_writes(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryQueue<T> {
        &self.inner
    }
}

#[async_trait]
impl<T> Queue<T> for FlakyQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn write(&self, items: Vec<T>) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Store("injected write failure".to_string()));
        }
        self.inner.write(items).await
    }

    async fn take(&self) -> Result<Delivery<T>> {
        self.inner.take().await
    }
}

/// Relational store whose transactions fail to begin on demand.
///
/// `fail_begins(skip, n)` lets the next `skip` calls to `begin` through,
/// then fails the following `n`.
#[derive(Clone)]
pub struct FlakyRelational {
    inner: MemoryRelational,
    plan: Arc<Mutex<(usize, usize)>>,
}

impl FlakyRelational {
    pub fn new(inner: MemoryRelational) -> Self {
        Self {
            inner,
            plan: Arc::new(Mutex::new((0, 0))),
        }
    }

    pub fn fail_begins(&self, skip: usize, n: usize) {
        *self.plan.lock().unwrap() = (skip, n);
    }
}

#[async_trait]
impl RelationalStore for FlakyRelational {
    type Tx = <MemoryRelational as RelationalStore>::Tx;

    async fn begin(&self) -> Result<Self::Tx> {
        let fail = {
            let mut plan = self.plan.lock().unwrap();
            match *plan {
                (0, 0) => false,
                (0, n) => {
                    *plan = (0, n - 1);
                    true
                }
                (skip, n) => {
                    *plan = (skip - 1, n);
                    false
                }
            }
        };
        if fail {
            return Err(EngineError::Store("injected begin failure".to_string()));
        }
        self.inner.begin().await
    }
}
