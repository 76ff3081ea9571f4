// src/futdep/mod.rs

//! Future -> dependency adapter.
//!
//! Lets a task wait on futures: each future id maps (lazily, stably) to a
//! dependency, and the processor resolves that dependency once the future
//! is resolved.

use crate::errors::Result;
use crate::future::FutureId;
use crate::kernel::{SpawnContext, SpawnOption, option};

mod manager;
mod plugin;
mod processor;

pub use manager::FutdepManager;
pub use plugin::FutdepPlugin;
pub use processor::FutdepProcessor;

pub const DATA_KEY: &str = "futdep";

/// Futures the task being spawned waits on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FutdepData {
    pub futures: Vec<FutureId>,
}

/// Make the spawning task wait until every future in `ids` is resolved.
pub fn wait_for(ids: impl IntoIterator<Item = FutureId>) -> SpawnOption {
    let ids: Vec<_> = ids.into_iter().collect();
    option(move |ctx| push_futures(ctx, ids))
}

pub(crate) fn push_futures(
    ctx: &mut SpawnContext<'_>,
    ids: impl IntoIterator<Item = FutureId>,
) -> Result<()> {
    ctx.data_mut()
        .get_or_default::<FutdepData>(DATA_KEY)?
        .futures
        .extend(ids);
    Ok(())
}
