// tests/deps_batched.rs

mod common;
use crate::common::fakes::{FlakyQueue, FlakyRelational};
use crate::common::{drain, init_tracing, memory_deps};

use std::sync::Arc;

use taskweave::deps::{DependencyManager, Deps, GroupId, GroupStatus};
use taskweave::store::{MemoryQueue, MemoryRelational};
use taskweave::types::ResolveStrategy;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn new_group_waits_for_initializer() -> TestResult {
    init_tracing();
    let (deps, ready) = memory_deps(ResolveStrategy::Batched);
    let initializer = deps.initializer();
    let scheduler = deps.scheduler(16);

    let a = deps.new_dependency().id;
    deps.resolve(&a).await?;
    let group = deps.make_group(&[a.clone()]).await?;

    let row = deps.group(&group).await?;
    assert_eq!(row.status, GroupStatus::Initializing);
    assert_eq!(row.pending, -1);

    // Not initialized yet: nothing to claim.
    assert!(scheduler.tick().await?.scheduled.is_empty());

    assert_eq!(initializer.tick().await?, vec![group.clone()]);
    let row = deps.group(&group).await?;
    assert_eq!(row.status, GroupStatus::Waiting);
    assert_eq!(row.pending, 0);
    assert!(ready.is_empty());

    let tick = scheduler.tick().await?;
    assert_eq!(tick.scheduled, vec![group.clone()]);
    assert_eq!(drain(&ready), vec![group.clone()]);
    assert_eq!(deps.group(&group).await?.status, GroupStatus::Scheduled);

    // Already scheduled groups are not claimed again.
    assert!(scheduler.tick().await?.scheduled.is_empty());
    Ok(())
}

#[tokio::test]
async fn resolves_before_initialization_are_counted_once() -> TestResult {
    let (deps, ready) = memory_deps(ResolveStrategy::Batched);
    let initializer = deps.initializer();
    let scheduler = deps.scheduler(16);

    let a = deps.new_dependency().id;
    let b = deps.new_dependency().id;
    let c = deps.new_dependency().id;
    let group = deps.make_group(&[a.clone(), b.clone(), c.clone()]).await?;

    deps.resolve(&b).await?;
    deps.resolve(&b).await?;
    assert_eq!(deps.group(&group).await?.pending, -1);

    initializer.tick().await?;
    assert_eq!(deps.group(&group).await?.pending, 2);

    deps.resolve(&c).await?;
    scheduler.tick().await?;
    assert!(ready.is_empty());

    deps.resolve(&a).await?;
    // Resolve alone never pushes under the batched strategy.
    assert!(ready.is_empty());
    assert_eq!(deps.group(&group).await?.status, GroupStatus::Waiting);

    scheduler.tick().await?;
    assert_eq!(drain(&ready), vec![group]);
    Ok(())
}

#[tokio::test]
async fn scheduler_respects_batch_size() -> TestResult {
    let (deps, ready) = memory_deps(ResolveStrategy::Batched);
    let initializer = deps.initializer();
    let scheduler = deps.scheduler(2);

    for _ in 0..3 {
        deps.make_group(&[]).await?;
    }
    initializer.tick().await?;

    assert_eq!(scheduler.tick().await?.scheduled.len(), 2);
    assert_eq!(scheduler.tick().await?.scheduled.len(), 1);
    assert!(scheduler.tick().await?.scheduled.is_empty());
    assert_eq!(drain(&ready).len(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_ready_push_is_retried_next_tick() -> TestResult {
    init_tracing();
    let flaky = Arc::new(FlakyQueue::new(MemoryQueue::<String>::new("ready")));
    let deps = DependencyManager::new(
        MemoryRelational::new(),
        flaky.clone(),
        ResolveStrategy::Batched,
    );
    let initializer = deps.initializer();
    let scheduler = deps.scheduler(16);

    let group = deps.make_group(&[]).await?;
    initializer.tick().await?;

    flaky.fail_next_writes(1);
    let tick = scheduler.tick().await?;
    assert!(tick.scheduled.is_empty());
    assert_eq!(tick.deferred, vec![group.clone()]);
    assert_eq!(deps.group(&group).await?.status, GroupStatus::Waiting);
    assert!(flaky.inner().is_empty());

    let tick = scheduler.tick().await?;
    assert_eq!(tick.scheduled, vec![group.clone()]);
    assert_eq!(drain(flaky.inner()), vec![group]);
    Ok(())
}

#[tokio::test]
async fn background_loops_deliver_ready_groups() -> TestResult {
    init_tracing();
    let (deps, _ready) = memory_deps(ResolveStrategy::Batched);
    let (trigger, signal) = taskweave::shutdown::channel();

    let interval = std::time::Duration::from_millis(5);
    let initializer = tokio::spawn(deps.initializer().run(interval, signal.clone()));
    let scheduler = tokio::spawn(deps.scheduler(8).run(interval, signal));

    let a = deps.new_dependency().id;
    let group = deps.make_group(&[a.clone()]).await?;
    deps.resolve(&a).await?;

    let delivery = common::with_timeout(deps.next_ready()).await?;
    assert_eq!(delivery.commit()?, group);

    trigger.trigger();
    initializer.await?;
    scheduler.await?;
    Ok(())
}

#[tokio::test]
async fn failed_status_update_is_settled_on_next_pass() -> TestResult {
    init_tracing();
    let store = FlakyRelational::new(MemoryRelational::new());
    let ready = MemoryQueue::<GroupId>::new("ready");
    let deps = DependencyManager::new(store.clone(), Arc::new(ready.clone()), ResolveStrategy::Batched);
    let initializer = deps.initializer();
    let scheduler = deps.scheduler(16);

    let a = deps.new_dependency().id;
    deps.resolve(&a).await?;
    let group = deps.make_group(&[a]).await?;
    initializer.tick().await?;

    // Claim succeeds, the status update after the push does not.
    store.fail_begins(1, 1);
    assert!(scheduler.tick().await.is_err());
    assert_eq!(deps.group(&group).await?.status, GroupStatus::Scheduling);

    let tick = scheduler.tick().await?;
    assert!(tick.is_empty());
    assert_eq!(deps.group(&group).await?.status, GroupStatus::Scheduled);

    // Pushed exactly once across both passes.
    assert_eq!(drain(&ready), vec![group]);
    Ok(())
}
