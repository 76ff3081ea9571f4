// src/engine/runtime.rs

use std::fmt;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{EngineError, Result};
use crate::shutdown::{Shutdown, ShutdownTrigger};

/// Background loops started by [`super::Engine::start`].
///
/// Dropping a `Runtime` without calling [`Runtime::shutdown`] also signals
/// the loops to stop (the trigger is dropped), but does not wait for them.
pub struct Runtime {
    trigger: ShutdownTrigger,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.loops.iter().map(|(name, _)| *name).collect();
        f.debug_struct("Runtime").field("loops", &names).finish()
    }
}

impl Runtime {
    pub(crate) fn new(trigger: ShutdownTrigger) -> Self {
        Self {
            trigger,
            loops: Vec::new(),
        }
    }

    pub(crate) fn signal(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    pub(crate) fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(loop_name = name, "spawning background loop");
        self.loops.push((name, tokio::spawn(fut)));
    }

    /// Names of the running loops, in start order.
    pub fn loops(&self) -> Vec<&'static str> {
        self.loops.iter().map(|(name, _)| *name).collect()
    }

    /// Ask every loop to stop and wait for all of them.
    ///
    /// Returns the first join failure (a panicked loop), after joining the
    /// rest.
    pub async fn shutdown(self) -> Result<()> {
        info!("runtime shutting down");
        self.trigger.trigger();

        let mut first_error = None;
        for (name, handle) in self.loops {
            if let Err(err) = handle.await {
                warn!(loop_name = name, error = %err, "background loop did not exit cleanly");
                if first_error.is_none() {
                    first_error = Some(EngineError::Other(anyhow::anyhow!(
                        "loop '{name}' failed: {err}"
                    )));
                }
            }
        }

        info!("runtime exited");
        first_error.map_or(Ok(()), Err)
    }
}
