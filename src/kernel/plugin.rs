// src/kernel/plugin.rs

//! Plugin capabilities.
//!
//! A plugin opts into a phase by returning `Some(self)` from the matching
//! `as_*` accessor. The kernel calls hooks in registration order.
//!
//! Spawn pipeline, per task:
//!
//! 1. options applied
//! 2. `BeforeInitialized` (error aborts the spawn)
//! 3. task persisted
//! 4. `AfterInitialized` (errors are logged)
//! 5. `BeforeScheduled` (error aborts; the task stays persisted)
//! 6. task handed to the kernel's inputs
//! 7. `AfterScheduled` (errors are logged)

use async_trait::async_trait;

use crate::errors::Result;

use super::Kernel;
use super::context::SpawnContext;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn as_initialize(&self) -> Option<&dyn Initialize> {
        None
    }

    fn as_before_initialized(&self) -> Option<&dyn BeforeInitialized> {
        None
    }

    fn as_after_initialized(&self) -> Option<&dyn AfterInitialized> {
        None
    }

    fn as_before_scheduled(&self) -> Option<&dyn BeforeScheduled> {
        None
    }

    fn as_after_scheduled(&self) -> Option<&dyn AfterScheduled> {
        None
    }
}

/// Called once from [`Kernel::register`], before the plugin is added.
pub trait Initialize: Send + Sync {
    fn initialize(&self, kernel: &Kernel) -> Result<()>;
}

#[async_trait]
pub trait BeforeInitialized: Send + Sync {
    async fn before_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()>;
}

#[async_trait]
pub trait AfterInitialized: Send + Sync {
    async fn after_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()>;
}

#[async_trait]
pub trait BeforeScheduled: Send + Sync {
    async fn before_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()>;
}

#[async_trait]
pub trait AfterScheduled: Send + Sync {
    async fn after_scheduled(&self, ctx: &mut SpawnContext<'_>) -> Result<()>;
}
