// src/lib.rs

//! Dependency-driven task orchestration.
//!
//! Tasks are spawned through a plugin-extensible [`kernel`] pipeline, held
//! by the [`depot`] until their dependency group resolves in the [`deps`]
//! store, and then released to a downstream task queue. Futures and
//! subtasks are both expressed as dependencies through the [`futdep`] and
//! [`taskdep`] adapters.
//!
//! [`engine::Engine`] wires everything over in-memory adapters.

pub mod config;
pub mod deps;
pub mod depot;
pub mod engine;
pub mod errors;
pub mod futdep;
pub mod future;
pub mod kernel;
pub mod logging;
pub mod meta;
pub mod shutdown;
pub mod spec;
pub mod status;
pub mod store;
pub mod taskdep;
pub mod types;

pub use engine::{Engine, Runtime};
pub use errors::{EngineError, Result};
pub use spec::{Parametrization, Spec};
