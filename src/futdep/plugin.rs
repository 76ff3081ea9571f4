// src/futdep/plugin.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::depot;
use crate::errors::Result;
use crate::kernel::{BeforeScheduled, Plugin, SpawnContext};

use super::{DATA_KEY, FutdepData, FutdepManager};

/// Turns the futures collected by [`super::wait_for`] into depot
/// dependencies.
pub struct FutdepPlugin {
    manager: Arc<FutdepManager>,
}

impl FutdepPlugin {
    pub fn new(manager: Arc<FutdepManager>) -> Self {
        Self { manager }
    }
}

impl Plugin for FutdepPlugin {
    fn name(&self) -> &str {
        "futdep"
    }

    fn as_before_scheduled(&self) -> Option<&dyn BeforeScheduled> {
        Some(self)
    }
}

#[async_trait]
impl BeforeScheduled for FutdepPlugin {
    async fn before_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        let futures = match ctx.data().get::<FutdepData>(DATA_KEY)? {
            Some(data) => data.futures.clone(),
            None => return Ok(()),
        };

        let mut dependencies = Vec::with_capacity(futures.len());
        for future in &futures {
            dependencies.push(self.manager.make(future).await?);
        }
        depot::push_dependencies(ctx, dependencies)
    }
}
