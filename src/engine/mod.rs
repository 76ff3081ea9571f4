// src/engine/mod.rs

//! In-memory wiring of the whole orchestration stack.
//!
//! [`Engine::in_memory`] builds every component over the in-memory store
//! adapters, registers the standard plugins (meta, status, futdep,
//! taskdep, in that order) and exposes the pieces a caller or test needs.
//! [`Engine::start`] launches the background loops.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::config::ConfigFile;
use crate::deps::{DependencyId, DependencyManager, Deps, GroupId};
use crate::depot::Depot;
use crate::errors::Result;
use crate::futdep::{FutdepManager, FutdepPlugin, FutdepProcessor};
use crate::future::{
    FutureId, FutureManager, FutureRecord, QueueRunner, Resource, Runner, SequentialRunner,
};
use crate::kernel::{Kernel, Plugin, SpawnResult, Task, TaskId};
use crate::meta::{MetaManager, MetaPlugin};
use crate::shutdown;
use crate::spec::Spec;
use crate::status::{StatusPlugin, StatusStore, StatusUpdater, TaskEvent, TaskStatus};
use crate::store::{Bus, KvBimap, MemoryBus, MemoryKv, MemoryQueue, MemoryRelational};
use crate::taskdep::{TaskdepListener, TaskdepManager, TaskdepPlugin};
use crate::types::ResolveStrategy;

mod runtime;

pub use runtime::Runtime;

pub struct Engine {
    config: ConfigFile,
    deps: Arc<DependencyManager<MemoryRelational>>,
    depot: Arc<Depot>,
    kernel: Arc<Kernel>,
    futures: Arc<FutureManager>,
    futdep: Arc<FutdepManager>,
    taskdep: Arc<TaskdepManager>,
    meta: Arc<MetaManager>,
    statuses: StatusStore,
    bus: Arc<MemoryBus>,
    ready: Arc<MemoryQueue<GroupId>>,
    scheduled: Arc<MemoryQueue<TaskId>>,
    resolutions: Arc<MemoryQueue<FutureId>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("kernel", &self.kernel)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn in_memory(config: &ConfigFile) -> Result<Self> {
        Self::in_memory_with(config, Vec::new(), Vec::new())
    }

    /// Like [`Engine::in_memory`], appending `plugins` after the standard
    /// ones and running `runners` after the futdep resolution queue.
    pub fn in_memory_with(
        config: &ConfigFile,
        plugins: Vec<Arc<dyn Plugin>>,
        runners: Vec<Arc<dyn Runner>>,
    ) -> Result<Self> {
        let ready = Arc::new(MemoryQueue::<GroupId>::new("ready"));
        let scheduled = Arc::new(MemoryQueue::<TaskId>::new("scheduled"));
        let resolutions = Arc::new(MemoryQueue::<FutureId>::new("resolutions"));
        let bus = Arc::new(MemoryBus::default());

        let deps = Arc::new(DependencyManager::new(
            MemoryRelational::new(),
            ready.clone(),
            config.deps.strategy,
        ));
        let bindings = Arc::new(KvBimap::new(
            Arc::new(MemoryKv::<TaskId>::new()),
            Arc::new(MemoryKv::<GroupId>::new()),
        ));
        let depot = Arc::new(Depot::new(
            deps.clone(),
            bindings,
            scheduled.clone(),
            config.depot,
        ));

        let mut runner = SequentialRunner::new(vec![Arc::new(QueueRunner::new(
            resolutions.clone(),
        ))]);
        for extra in runners {
            runner.push(extra);
        }
        let futures = Arc::new(FutureManager::new(
            Arc::new(MemoryKv::<FutureRecord>::new()),
            Arc::new(MemoryKv::<Resource>::new()),
            Arc::new(runner),
        ));

        let statuses = StatusStore::new(Arc::new(MemoryKv::<TaskStatus>::new()));
        let futdep = Arc::new(FutdepManager::new(
            deps.clone(),
            Arc::new(MemoryKv::<DependencyId>::new()),
            futures.clone(),
        ));
        let taskdep = Arc::new(
            TaskdepManager::new(deps.clone(), Arc::new(MemoryKv::<DependencyId>::new()))
                .with_statuses(statuses.clone()),
        );
        let meta = Arc::new(MetaManager::new(Arc::new(MemoryKv::<Value>::new())));

        let mut kernel = Kernel::new(Arc::new(MemoryKv::<Task>::new()), depot.clone());
        kernel.register(Arc::new(MetaPlugin::new(meta.clone())))?;
        kernel.register(Arc::new(StatusPlugin::new(statuses.clone())))?;
        kernel.register(Arc::new(FutdepPlugin::new(futdep.clone())))?;
        kernel.register(Arc::new(TaskdepPlugin::new(taskdep.clone())))?;
        for plugin in plugins {
            kernel.register(plugin)?;
        }

        Ok(Self {
            config: config.clone(),
            deps,
            depot,
            kernel: Arc::new(kernel),
            futures,
            futdep,
            taskdep,
            meta,
            statuses,
            bus,
            ready,
            scheduled,
            resolutions,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn deps(&self) -> &Arc<DependencyManager<MemoryRelational>> {
        &self.deps
    }

    pub fn depot(&self) -> &Arc<Depot> {
        &self.depot
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn futures(&self) -> &Arc<FutureManager> {
        &self.futures
    }

    pub fn futdep(&self) -> &Arc<FutdepManager> {
        &self.futdep
    }

    pub fn taskdep(&self) -> &Arc<TaskdepManager> {
        &self.taskdep
    }

    pub fn meta(&self) -> &Arc<MetaManager> {
        &self.meta
    }

    pub fn statuses(&self) -> &StatusStore {
        &self.statuses
    }

    pub fn bus(&self) -> &Arc<MemoryBus> {
        &self.bus
    }

    /// Ready group ids not yet taken by the depot.
    pub fn ready_queue(&self) -> &Arc<MemoryQueue<GroupId>> {
        &self.ready
    }

    /// Task ids released by the depot, waiting for an executor.
    pub fn scheduled(&self) -> &Arc<MemoryQueue<TaskId>> {
        &self.scheduled
    }

    pub fn resolutions(&self) -> &Arc<MemoryQueue<FutureId>> {
        &self.resolutions
    }

    /// Compile and spawn `spec` through the kernel.
    pub async fn spawn(&self, spec: Spec) -> Result<SpawnResult> {
        let task = spec.compile(self.config.auto_input_deps)?;
        self.kernel.spawn(task).await
    }

    /// Resolve a raw dependency id.
    pub async fn resolve(&self, dependency: &str) -> Result<()> {
        self.deps.resolve(dependency).await
    }

    /// Publish an executor lifecycle event for `task`.
    pub async fn emit(&self, event: TaskEvent, task: &str) -> Result<()> {
        self.bus
            .publish(event.event(&self.config.events_topic, task))
            .await
    }

    /// Start every background loop.
    ///
    /// Bus subscriptions are in place when this returns, so events emitted
    /// afterwards are not missed.
    pub async fn start(&self) -> Result<Runtime> {
        let (trigger, _) = shutdown::channel();
        let mut runtime = Runtime::new(trigger);

        if self.config.deps.strategy == ResolveStrategy::Batched {
            let initializer = self.deps.initializer();
            let interval = self.config.deps.initializer_interval;
            let signal = runtime.signal();
            runtime.spawn("group-initializer", initializer.run(interval, signal));

            let scheduler = self.deps.scheduler(self.config.deps.batch_size);
            let interval = self.config.deps.scheduler_interval;
            let signal = runtime.signal();
            runtime.spawn("group-scheduler", scheduler.run(interval, signal));
        }

        let depot = self.depot.clone();
        let signal = runtime.signal();
        runtime.spawn("depot", async move { depot.process(signal).await });

        let processor = FutdepProcessor::new(
            self.futdep.clone(),
            self.resolutions.clone(),
            self.config.depot.retry_backoff,
        );
        let signal = runtime.signal();
        runtime.spawn("futdep-processor", processor.run(signal));

        let topic = self.config.events_topic.clone();
        let listener = TaskdepListener::new(self.taskdep.clone(), self.bus.clone(), topic.clone());
        let events = listener.subscribe().await?;
        let signal = runtime.signal();
        runtime.spawn("taskdep-listener", listener.run(events, signal));

        let updater = StatusUpdater::new(self.statuses.clone(), self.bus.clone(), topic);
        let events = updater.subscribe().await?;
        let signal = runtime.signal();
        runtime.spawn("status-updater", updater.run(events, signal));

        info!(loops = ?runtime.loops(), strategy = ?self.config.deps.strategy, "engine started");
        Ok(runtime)
    }
}
