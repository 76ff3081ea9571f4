// tests/engine_end_to_end.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{eventually, init_tracing};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskweave::deps::Deps;
use taskweave::status::{TaskEvent, TaskStatus};
use taskweave::store::MemoryQueue;
use taskweave::{Engine, EngineError, Parametrization, Spec};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn contains(queue: &Arc<MemoryQueue<String>>, task: &str) -> bool {
    queue.snapshot().iter().any(|id| id == task)
}

async fn wait_scheduled(engine: &Engine, task: &str) {
    let scheduled = engine.scheduled().clone();
    let task = task.to_string();
    eventually(move || {
        let scheduled = scheduled.clone();
        let task = task.clone();
        async move { contains(&scheduled, &task) }
    })
    .await;
}

async fn task_gated_on_dependency(config: taskweave::config::ConfigFile) -> TestResult {
    init_tracing();
    let engine = Engine::in_memory(&config)?;
    let runtime = engine.start().await?;

    let gate = engine.deps().new_dependency().id;
    let spawned = engine
        .spawn(Spec::describe("compute").with_static(b"payload".to_vec()).with_deps([gate.clone()]))
        .await?;

    let task = engine.kernel().task(&spawned.task).await?;
    assert_eq!(task.task_type, "compute");
    assert_eq!(Parametrization::of(&task)?.static_data, b"payload".to_vec());
    assert_eq!(spawned.log.spawned, vec![spawned.task.clone()]);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!contains(engine.scheduled(), &spawned.task));

    engine.resolve(&gate).await?;
    wait_scheduled(&engine, &spawned.task).await;

    // Resolving again must not release the task a second time.
    engine.resolve(&gate).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let copies = engine
        .scheduled()
        .snapshot()
        .into_iter()
        .filter(|id| id == &spawned.task)
        .count();
    assert_eq!(copies, 1);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn instant_task_waits_for_its_dependency() -> TestResult {
    task_gated_on_dependency(ConfigFileBuilder::instant().build()).await
}

#[tokio::test]
async fn batched_task_waits_for_its_dependency() -> TestResult {
    task_gated_on_dependency(ConfigFileBuilder::batched().build()).await
}

#[tokio::test]
async fn task_without_waits_is_scheduled() -> TestResult {
    let engine = Engine::in_memory(&ConfigFileBuilder::batched().build())?;
    let runtime = engine.start().await?;

    let spawned = engine.spawn(Spec::describe("noop")).await?;
    wait_scheduled(&engine, &spawned.task).await;

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn input_future_releases_task_once_resolved() -> TestResult {
    init_tracing();
    let engine = Engine::in_memory(&ConfigFileBuilder::instant().build())?;
    let runtime = engine.start().await?;

    let input = engine.futures().make("blob", b"s3://bucket/key".to_vec()).await?;
    let output = engine.futures().make("blob", Vec::<u8>::new()).await?;
    let spawned = engine
        .spawn(
            Spec::describe("transform")
                .with_inputs([input.id.clone()])
                .with_outputs([output.id.clone()]),
        )
        .await?;

    let params = Parametrization::of(&engine.kernel().task(&spawned.task).await?)?;
    assert_eq!(params.inputs, vec![input.id.clone()]);
    assert_eq!(params.outputs, vec![output.id.clone()]);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!contains(engine.scheduled(), &spawned.task));

    engine.futures().resolve(&input.id, b"bytes".to_vec()).await?;
    wait_scheduled(&engine, &spawned.task).await;

    let resolution = engine.futures().load(&input.id).await?;
    assert_eq!(resolution.resource, b"bytes".to_vec());

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn inputs_are_not_waited_on_without_auto_input_deps() -> TestResult {
    let config = ConfigFileBuilder::instant().auto_input_deps(false).build();
    let engine = Engine::in_memory(&config)?;
    let runtime = engine.start().await?;

    let input = engine.futures().make("blob", Vec::<u8>::new()).await?;
    let spawned = engine
        .spawn(Spec::describe("peek").with_inputs([input.id.clone()]))
        .await?;
    wait_scheduled(&engine, &spawned.task).await;

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_future_still_releases_waiting_task() -> TestResult {
    let engine = Engine::in_memory(&ConfigFileBuilder::instant().build())?;
    let runtime = engine.start().await?;

    let future = engine.futures().make("blob", Vec::<u8>::new()).await?;
    let spawned = engine
        .spawn(Spec::describe("cleanup").with_futures([future.id.clone()]))
        .await?;

    engine.futures().fail(&future.id, b"upstream crashed".to_vec()).await?;
    wait_scheduled(&engine, &spawned.task).await;

    let second = engine.futures().resolve(&future.id, Vec::<u8>::new()).await;
    assert!(matches!(second, Err(EngineError::AlreadyResolved(_))));

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn subtask_outputs_release_parent() -> TestResult {
    init_tracing();
    let engine = Engine::in_memory(&ConfigFileBuilder::batched().build())?;
    let runtime = engine.start().await?;

    let child = engine.spawn(Spec::describe("child")).await?;
    let parent = engine
        .spawn(Spec::describe("parent").with_subtasks([child.task.clone()]))
        .await?;

    wait_scheduled(&engine, &child.task).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!contains(engine.scheduled(), &parent.task));

    engine.emit(TaskEvent::ReceivedTask, &child.task).await?;
    engine.emit(TaskEvent::ExecutedTask, &child.task).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!contains(engine.scheduled(), &parent.task));

    engine.emit(TaskEvent::SentOutputs, &child.task).await?;
    wait_scheduled(&engine, &parent.task).await;

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn subtask_completed_before_parent_spawn_does_not_block_it() -> TestResult {
    let engine = Engine::in_memory(&ConfigFileBuilder::instant().build())?;
    let runtime = engine.start().await?;

    let child = engine.spawn(Spec::describe("child")).await?;
    engine.emit(TaskEvent::SentOutputs, &child.task).await?;

    let statuses = engine.statuses().clone();
    let id = child.task.clone();
    eventually(move || {
        let statuses = statuses.clone();
        let id = id.clone();
        async move { matches!(statuses.get(&id).await, Ok(TaskStatus::Complete)) }
    })
    .await;

    let parent = engine
        .spawn(Spec::describe("parent").with_subtasks([child.task.clone()]))
        .await?;
    wait_scheduled(&engine, &parent.task).await;

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn status_follows_lifecycle_events_forward_only() -> TestResult {
    let engine = Engine::in_memory(&ConfigFileBuilder::instant().build())?;
    let runtime = engine.start().await?;

    let spawned = engine.spawn(Spec::describe("step")).await?;
    assert_eq!(engine.statuses().get(&spawned.task).await?, TaskStatus::Scheduled);

    engine.emit(TaskEvent::ExecutedTask, &spawned.task).await?;
    let statuses = engine.statuses().clone();
    let id = spawned.task.clone();
    eventually(move || {
        let statuses = statuses.clone();
        let id = id.clone();
        async move { matches!(statuses.get(&id).await, Ok(TaskStatus::Executed)) }
    })
    .await;

    // A late ReceivedTask must not move the status backwards.
    engine.emit(TaskEvent::ReceivedTask, &spawned.task).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.statuses().get(&spawned.task).await?, TaskStatus::Executed);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn meta_entries_are_stored_per_task() -> TestResult {
    let engine = Engine::in_memory(&ConfigFileBuilder::instant().build())?;

    let spawned = engine
        .spawn(
            Spec::describe("report")
                .with_meta("owner", "ops")
                .with_meta("attempt", 3)
                .with_context("nightly"),
        )
        .await?;

    let meta = engine.meta();
    assert_eq!(meta.get(&spawned.task, "owner").await?, json!("ops"));
    assert_eq!(meta.load::<u32>(&spawned.task, "attempt").await?, 3);
    assert_eq!(meta.get(&spawned.task, "context").await?, json!("nightly"));
    let missing = meta.get(&spawned.task, "missing").await;
    assert!(missing.is_err_and(|err| err.is_not_found()));
    Ok(())
}

#[tokio::test]
async fn shared_future_maps_to_one_dependency_across_tasks() -> TestResult {
    let engine = Arc::new(Engine::in_memory(&ConfigFileBuilder::instant().build())?);
    let runtime = engine.start().await?;

    let future = engine.futures().make("blob", Vec::<u8>::new()).await?;
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        let id = future.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .spawn(Spec::describe(format!("reader-{i}")).with_inputs([id]))
                .await
                .map(|spawned| spawned.task)
        }));
    }
    let mut tasks = HashSet::new();
    for handle in handles {
        tasks.insert(handle.await??);
    }

    let dependency = engine.futdep().make(&future.id).await?;
    assert!(!engine.deps().dependency(&dependency).await?.resolved);

    engine.futures().resolve(&future.id, Vec::<u8>::new()).await?;
    for task in &tasks {
        wait_scheduled(&engine, task).await;
    }
    assert!(engine.deps().dependency(&dependency).await?.resolved);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn runtime_starts_loops_for_strategy() -> TestResult {
    let instant = Engine::in_memory(&ConfigFileBuilder::instant().build())?;
    let runtime = instant.start().await?;
    assert_eq!(
        runtime.loops(),
        vec!["depot", "futdep-processor", "taskdep-listener", "status-updater"]
    );
    runtime.shutdown().await?;

    let batched = Engine::in_memory(&ConfigFileBuilder::batched().build())?;
    let runtime = batched.start().await?;
    assert_eq!(
        runtime.loops(),
        vec![
            "group-initializer",
            "group-scheduler",
            "depot",
            "futdep-processor",
            "taskdep-listener",
            "status-updater",
        ]
    );
    runtime.shutdown().await?;
    Ok(())
}
