// src/future/runner.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::store::Queue;

use super::{FutureId, Resolution};

/// Reacts to a freshly stored resolution.
///
/// Called at most once per future, right after the resource is written.
pub trait Runner: Send + Sync {
    fn run<'a>(
        &'a self,
        resolution: &'a Resolution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Runs several runners in order, stopping at the first error.
#[derive(Default)]
pub struct SequentialRunner {
    runners: Vec<Arc<dyn Runner>>,
}

impl SequentialRunner {
    pub fn new(runners: Vec<Arc<dyn Runner>>) -> Self {
        Self { runners }
    }

    pub fn push(&mut self, runner: Arc<dyn Runner>) {
        self.runners.push(runner);
    }
}

impl Runner for SequentialRunner {
    fn run<'a>(
        &'a self,
        resolution: &'a Resolution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for runner in &self.runners {
                runner.run(resolution).await?;
            }
            Ok(())
        })
    }
}

/// Enqueues the resolved future's id, typically for the futdep processor.
pub struct QueueRunner {
    queue: Arc<dyn Queue<FutureId>>,
}

impl QueueRunner {
    pub fn new(queue: Arc<dyn Queue<FutureId>>) -> Self {
        Self { queue }
    }
}

impl Runner for QueueRunner {
    fn run<'a>(
        &'a self,
        resolution: &'a Resolution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.queue
                .write(vec![resolution.future.id.clone()])
                .await
        })
    }
}
