// src/logging.rs

//! Process-wide `tracing` subscriber for binaries embedding taskweave.
//!
//! The filter comes from, in order: the level passed in (normally
//! `ConfigFile::log_level`), the `TASKWEAVE_LOG` environment variable
//! (any `EnvFilter` directive string, e.g. `"taskweave::depot=debug,warn"`),
//! then `info`. Output goes to stderr.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::types::LogLevel;

pub const LOG_ENV: &str = "TASKWEAVE_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Filter for an explicit level or, failing that, an env directive string.
///
/// Unparseable directives fall back to `info`.
pub fn build_filter(level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = level {
        return EnvFilter::new(directive(level));
    }
    env.filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
