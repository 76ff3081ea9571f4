// tests/taskdep.rs

mod common;
use crate::common::{drain, memory_deps};

use std::collections::HashSet;
use std::sync::Arc;

use taskweave::deps::Deps;
use taskweave::status::{StatusStore, TaskEvent, TaskStatus};
use taskweave::store::{Event, MemoryBus, MemoryKv};
use taskweave::taskdep::{TaskdepListener, TaskdepManager};
use taskweave::types::ResolveStrategy;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn subtask_dependency_is_stable_under_concurrency() -> TestResult {
    let (deps, _ready) = memory_deps(ResolveStrategy::Instant);
    let task2dep = MemoryKv::<String>::new();
    let manager = Arc::new(TaskdepManager::new(Arc::new(deps), Arc::new(task2dep.clone())));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.subtask_dependency("task-a").await
        }));
    }
    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await??);
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(task2dep.len(), 1);
    Ok(())
}

#[tokio::test]
async fn sent_outputs_event_resolves_subtask_dependency() -> TestResult {
    let (deps, ready) = memory_deps(ResolveStrategy::Instant);
    let deps = Arc::new(deps);
    let manager = Arc::new(TaskdepManager::new(
        deps.clone(),
        Arc::new(MemoryKv::<String>::new()),
    ));
    let listener = TaskdepListener::new(manager.clone(), Arc::new(MemoryBus::default()), "tasks");

    let dependency = manager.subtask_dependency("task-a").await?;
    let group = deps.make_group(&[dependency]).await?;

    let unrelated = TaskEvent::ReceivedTask.event("tasks", "task-a");
    assert!(!listener.handle(&unrelated).await?);
    assert!(ready.is_empty());

    let unknown = TaskEvent::SentOutputs.event("tasks", "task-z");
    assert!(!listener.handle(&unknown).await?);

    let done = TaskEvent::SentOutputs.event("tasks", "task-a");
    assert!(listener.handle(&done).await?);
    assert_eq!(drain(&ready), vec![group]);
    Ok(())
}

#[tokio::test]
async fn malformed_event_data_is_an_error() -> TestResult {
    let (deps, _ready) = memory_deps(ResolveStrategy::Instant);
    let manager = Arc::new(TaskdepManager::new(
        Arc::new(deps),
        Arc::new(MemoryKv::<String>::new()),
    ));
    let listener = TaskdepListener::new(manager, Arc::new(MemoryBus::default()), "tasks");

    let event = Event::new("tasks", "SentOutputs", vec![0xff, 0xfe]);
    assert!(listener.handle(&event).await.is_err());
    Ok(())
}

#[tokio::test]
async fn subtask_completed_before_reference_is_resolved_on_reference() -> TestResult {
    let (deps, ready) = memory_deps(ResolveStrategy::Instant);
    let deps = Arc::new(deps);
    let statuses = StatusStore::new(Arc::new(MemoryKv::<TaskStatus>::new()));
    let manager = TaskdepManager::new(deps.clone(), Arc::new(MemoryKv::<String>::new()))
        .with_statuses(statuses.clone());

    statuses.advance("task-a", TaskStatus::Complete).await?;

    let dependency = manager.subtask_dependency("task-a").await?;
    assert!(deps.dependency(&dependency).await?.resolved);
    let group = deps.make_group(&[dependency]).await?;
    assert_eq!(drain(&ready), vec![group]);
    Ok(())
}

#[tokio::test]
async fn outputs_sent_before_first_reference_still_resolve_it() -> TestResult {
    let (deps, ready) = memory_deps(ResolveStrategy::Instant);
    let deps = Arc::new(deps);
    let statuses = StatusStore::new(Arc::new(MemoryKv::<TaskStatus>::new()));
    let manager = Arc::new(
        TaskdepManager::new(deps.clone(), Arc::new(MemoryKv::<String>::new()))
            .with_statuses(statuses.clone()),
    );
    let listener = TaskdepListener::new(manager.clone(), Arc::new(MemoryBus::default()), "tasks");

    // No status updater runs here: the listener alone records completion.
    let done = TaskEvent::SentOutputs.event("tasks", "task-a");
    assert!(!listener.handle(&done).await?);
    assert_eq!(statuses.get("task-a").await?, TaskStatus::Complete);

    let dependency = manager.subtask_dependency("task-a").await?;
    assert!(deps.dependency(&dependency).await?.resolved);
    let group = deps.make_group(&[dependency]).await?;
    assert_eq!(drain(&ready), vec![group]);
    Ok(())
}
