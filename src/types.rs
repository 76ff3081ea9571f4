use std::str::FromStr;
use serde::Deserialize;

/// How the dependency store turns "pending reached zero" into a ready signal.
///
/// - `Instant`: groups are pushed onto the ready queue inside the same
///   transaction that created or resolved them. Lower latency, one queue
///   write per resolution.
/// - `Batched`: groups are created `Initializing`, counted by the group
///   initializer and dispatched in batches by the group scheduler. Higher
///   latency, bounded write amplification under bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    Instant,
    Batched,
}

impl Default for ResolveStrategy {
    fn default() -> Self {
        ResolveStrategy::Batched
    }
}

impl FromStr for ResolveStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instant" => Ok(ResolveStrategy::Instant),
            "batched" => Ok(ResolveStrategy::Batched),
            other => Err(format!(
                "invalid strategy: {other} (expected \"instant\" or \"batched\")"
            )),
        }
    }
}

/// How the depot persists the group -> task binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    /// Create the group, then save the binding. A group may become ready
    /// before its binding exists; the dispatch loop then fails the lookup
    /// and relies on redelivery.
    Separate,
    /// Save the binding inside the group-creation transaction.
    Transactional,
}

impl Default for BindingMode {
    fn default() -> Self {
        BindingMode::Separate
    }
}

/// What the depot dispatch loop does with a ready signal it failed to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchFailurePolicy {
    /// Roll the delivery back so it is redelivered.
    Rollback,
    /// Commit (discard) the delivery after logging.
    Drop,
}

impl Default for DispatchFailurePolicy {
    fn default() -> Self {
        DispatchFailurePolicy::Rollback
    }
}

/// Whether group -> task bindings survive a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingRetention {
    Keep,
    Release,
}

impl Default for BindingRetention {
    fn default() -> Self {
        BindingRetention::Keep
    }
}

/// Log level as accepted in `[logging]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
