// src/spec.rs

//! User-facing task description.
//!
//! A [`Spec`] collects a task type, its parametrization (static payload
//! plus input and output futures) and kernel options; [`Spec::compile`]
//! turns it into a [`TaskSpec`] whose data is the JSON-encoded
//! parametrization.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deps::DependencyId;
use crate::errors::Result;
use crate::future::FutureId;
use crate::kernel::{SpawnOption, Task, TaskId, TaskSpec};
use crate::{depot, futdep, meta, taskdep};

/// What a task consumes and produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parametrization {
    #[serde(default)]
    pub inputs: Vec<FutureId>,
    #[serde(default)]
    pub outputs: Vec<FutureId>,
    #[serde(default, rename = "static")]
    pub static_data: Vec<u8>,
}

impl Parametrization {
    /// Decode the parametrization stored in a compiled task.
    pub fn of(task: &Task) -> Result<Self> {
        Ok(serde_json::from_slice(&task.data)?)
    }
}

pub struct Spec {
    task_type: String,
    parametrization: Parametrization,
    options: Vec<SpawnOption>,
}

impl Spec {
    pub fn describe(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            parametrization: Parametrization::default(),
            options: Vec::new(),
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn parametrization(&self) -> &Parametrization {
        &self.parametrization
    }

    pub fn with_static(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.parametrization.static_data = data.into();
        self
    }

    /// Futures the task reads. Replaces any earlier inputs.
    pub fn with_inputs(mut self, ids: impl IntoIterator<Item = FutureId>) -> Self {
        self.parametrization.inputs = ids.into_iter().collect();
        self
    }

    /// Futures the task is expected to resolve. Replaces any earlier outputs.
    pub fn with_outputs(mut self, ids: impl IntoIterator<Item = FutureId>) -> Self {
        self.parametrization.outputs = ids.into_iter().collect();
        self
    }

    pub fn with_deps(mut self, ids: impl IntoIterator<Item = DependencyId>) -> Self {
        self.options.extend(ids.into_iter().map(depot::dependency));
        self
    }

    /// Wait for these futures without reading them as inputs.
    pub fn with_futures(self, ids: impl IntoIterator<Item = FutureId>) -> Self {
        self.with_options([futdep::wait_for(ids)])
    }

    /// Wait for these tasks to send their outputs.
    pub fn with_subtasks(self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.with_options([taskdep::after(ids)])
    }

    pub fn with_meta(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_options([meta::with_entry(key, value)])
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        self.with_meta("context", context.into())
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = SpawnOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// Encode into a kernel [`TaskSpec`].
    ///
    /// With `auto_input_deps`, every input future also becomes a wait.
    pub fn compile(self, auto_input_deps: bool) -> Result<TaskSpec> {
        let data = serde_json::to_vec(&self.parametrization)?;
        let mut options = self.options;
        if auto_input_deps && !self.parametrization.inputs.is_empty() {
            options.push(futdep::wait_for(self.parametrization.inputs));
        }
        Ok(TaskSpec::describe(self.task_type, data).with_all(options))
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("task_type", &self.task_type)
            .field("parametrization", &self.parametrization)
            .field("options", &self.options.len())
            .finish()
    }
}
