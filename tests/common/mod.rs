#![allow(dead_code)]

pub use taskweave_test_utils::builders;
pub use taskweave_test_utils::fakes;
pub use taskweave_test_utils::{eventually, init_tracing, with_timeout};

use std::sync::Arc;

use taskweave::deps::{DependencyManager, GroupId};
use taskweave::store::{MemoryQueue, MemoryRelational};
use taskweave::types::ResolveStrategy;

/// Dependency manager over fresh in-memory tables, plus its ready queue.
pub fn memory_deps(
    strategy: ResolveStrategy,
) -> (DependencyManager<MemoryRelational>, MemoryQueue<GroupId>) {
    let ready = MemoryQueue::<GroupId>::new("ready");
    let deps = DependencyManager::new(MemoryRelational::new(), Arc::new(ready.clone()), strategy);
    (deps, ready)
}

/// Take everything currently visible on `queue`, committing each item.
pub fn drain<T>(queue: &MemoryQueue<T>) -> Vec<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut items = Vec::new();
    while let Some(delivery) = queue.try_take().unwrap() {
        items.push(delivery.commit().unwrap());
    }
    items
}
