// src/kernel/task.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

use super::context::SpawnContext;

pub type TaskId = String;

/// A compiled, persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: String,
    pub data: Vec<u8>,
}

/// Mutation applied to a [`SpawnContext`] at the start of the spawn
/// pipeline, in the order the options were added.
pub type SpawnOption = Box<dyn FnOnce(&mut SpawnContext<'_>) -> Result<()> + Send>;

/// Box a closure as a [`SpawnOption`].
pub fn option<F>(f: F) -> SpawnOption
where
    F: FnOnce(&mut SpawnContext<'_>) -> Result<()> + Send + 'static,
{
    Box::new(f)
}

/// What to spawn: a task type, its opaque payload and the options that
/// configure plugins for it.
pub struct TaskSpec {
    pub task_type: String,
    pub data: Vec<u8>,
    pub options: Vec<SpawnOption>,
}

impl TaskSpec {
    pub fn describe(task_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            task_type: task_type.into(),
            data: data.into(),
            options: Vec::new(),
        }
    }

    pub fn with(mut self, option: SpawnOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_all(mut self, options: impl IntoIterator<Item = SpawnOption>) -> Self {
        self.options.extend(options);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("task_type", &self.task_type)
            .field("data_len", &self.data.len())
            .field("options", &self.options.len())
            .finish()
    }
}
