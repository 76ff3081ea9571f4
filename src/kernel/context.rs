// src/kernel/context.rs

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::errors::{EngineError, Result};

use super::Kernel;
use super::task::{Task, TaskId};

/// Record of every task spawned during one top-level spawn, nested spawns
/// included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnLog {
    pub spawned: Vec<TaskId>,
}

impl SpawnLog {
    pub fn merge(&mut self, other: &SpawnLog) {
        self.spawned.extend(other.spawned.iter().cloned());
    }
}

/// Per-spawn scratch space where options and plugins exchange typed
/// values under string keys.
#[derive(Default)]
pub struct PluginData {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PluginData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Typed read. A value of a different type under `key` is an error.
    pub fn get<T: Any>(&self, key: &str) -> Result<Option<&T>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(value) => (**value)
                .downcast_ref::<T>()
                .map(Some)
                .ok_or_else(|| EngineError::PluginData {
                    key: key.to_string(),
                }),
        }
    }

    /// Typed mutable access, inserting `T::default()` when absent.
    pub fn get_or_default<T>(&mut self, key: &str) -> Result<&mut T>
    where
        T: Any + Default + Send + Sync,
    {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Box::new(T::default()));
        (**entry)
            .downcast_mut::<T>()
            .ok_or_else(|| EngineError::PluginData {
                key: key.to_string(),
            })
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), Box::new(value));
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

impl fmt::Debug for PluginData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("PluginData").field("keys", &keys).finish()
    }
}

/// State carried through one spawn pipeline.
///
/// Hooks get `&mut SpawnContext`; nested spawns go through
/// [`Kernel::spawn_within`] so their log is merged into this one.
pub struct SpawnContext<'k> {
    kernel: &'k Kernel,
    task: Task,
    data: PluginData,
    log: SpawnLog,
}

impl<'k> SpawnContext<'k> {
    pub(crate) fn new(kernel: &'k Kernel, task: Task) -> Self {
        Self {
            kernel,
            task,
            data: PluginData::new(),
            log: SpawnLog::default(),
        }
    }

    pub fn kernel(&self) -> &'k Kernel {
        self.kernel
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut Task {
        &mut self.task
    }

    pub fn data(&self) -> &PluginData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut PluginData {
        &mut self.data
    }

    pub fn log(&self) -> &SpawnLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut SpawnLog {
        &mut self.log
    }

    pub(crate) fn into_log(self) -> SpawnLog {
        self.log
    }
}

impl fmt::Debug for SpawnContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnContext")
            .field("task", &self.task)
            .field("data", &self.data)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}
