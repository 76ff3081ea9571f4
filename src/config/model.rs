// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::{BindingMode, BindingRetention, DispatchFailurePolicy, LogLevel, ResolveStrategy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [deps]
/// strategy = "batched"
/// initializer_interval = "1s"
/// scheduler_interval = "1s"
/// batch_size = 1024
///
/// [depot]
/// binding = "separate"
/// on_dispatch_failure = "rollback"
///
/// [events]
/// topic = "tasks"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub deps: DepsSection,

    #[serde(default)]
    pub depot: DepotSection,

    #[serde(default)]
    pub events: EventsSection,

    #[serde(default)]
    pub futures: FuturesSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[deps]` section: dependency store strategy and polling knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct DepsSection {
    #[serde(default)]
    pub strategy: ResolveStrategy,

    /// How often the group initializer counts pending members of new groups.
    #[serde(default = "default_interval")]
    pub initializer_interval: String,

    /// How often the group scheduler looks for groups with `pending = 0`.
    #[serde(default = "default_interval")]
    pub scheduler_interval: String,

    /// Upper bound on groups dispatched per scheduler tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_interval() -> String {
    "1s".to_string()
}

fn default_batch_size() -> usize {
    1024
}

impl Default for DepsSection {
    fn default() -> Self {
        Self {
            strategy: ResolveStrategy::default(),
            initializer_interval: default_interval(),
            scheduler_interval: default_interval(),
            batch_size: default_batch_size(),
        }
    }
}

/// `[depot]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DepotSection {
    #[serde(default)]
    pub binding: BindingMode,

    #[serde(default)]
    pub on_dispatch_failure: DispatchFailurePolicy,

    /// Pause after rolling a ready signal back, before taking the next one.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: String,

    #[serde(default)]
    pub binding_retention: BindingRetention,
}

fn default_retry_backoff() -> String {
    "100ms".to_string()
}

impl Default for DepotSection {
    fn default() -> Self {
        Self {
            binding: BindingMode::default(),
            on_dispatch_failure: DispatchFailurePolicy::default(),
            retry_backoff: default_retry_backoff(),
            binding_retention: BindingRetention::default(),
        }
    }
}

/// `[events]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsSection {
    /// Bus topic carrying task lifecycle events.
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "tasks".to_string()
}

impl Default for EventsSection {
    fn default() -> Self {
        Self { topic: default_topic() }
    }
}

/// `[futures]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FuturesSection {
    /// If true, every input future of a spec becomes a dependency of the task.
    #[serde(default = "default_true")]
    pub auto_input_deps: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FuturesSection {
    fn default() -> Self {
        Self { auto_input_deps: true }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// Resolved `[deps]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepsConfig {
    pub strategy: ResolveStrategy,
    pub initializer_interval: Duration,
    pub scheduler_interval: Duration,
    pub batch_size: usize,
}

impl Default for DepsConfig {
    fn default() -> Self {
        Self {
            strategy: ResolveStrategy::default(),
            initializer_interval: Duration::from_secs(1),
            scheduler_interval: Duration::from_secs(1),
            batch_size: default_batch_size(),
        }
    }
}

/// Resolved `[depot]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepotConfig {
    pub binding: BindingMode,
    pub on_dispatch_failure: DispatchFailurePolicy,
    pub retry_backoff: Duration,
    pub binding_retention: BindingRetention,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            binding: BindingMode::default(),
            on_dispatch_failure: DispatchFailurePolicy::default(),
            retry_backoff: Duration::from_millis(100),
            binding_retention: BindingRetention::default(),
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub deps: DepsConfig,
    pub depot: DepotConfig,
    pub events_topic: String,
    pub auto_input_deps: bool,
    pub log_level: Option<LogLevel>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            deps: DepsConfig::default(),
            depot: DepotConfig::default(),
            events_topic: default_topic(),
            auto_input_deps: true,
            log_level: None,
        }
    }
}
