#![allow(dead_code)]

use taskweave::config::{ConfigFile, RawConfigFile};
use taskweave::types::{BindingMode, BindingRetention, DispatchFailurePolicy, ResolveStrategy};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the defaults with short intervals, so batched loops tick
/// quickly when a test lets them run.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.deps.initializer_interval = "10ms".to_string();
        config.deps.scheduler_interval = "10ms".to_string();
        config.depot.retry_backoff = "10ms".to_string();
        Self { config }
    }

    pub fn instant() -> Self {
        Self::new().strategy(ResolveStrategy::Instant)
    }

    pub fn batched() -> Self {
        Self::new().strategy(ResolveStrategy::Batched)
    }

    pub fn strategy(mut self, strategy: ResolveStrategy) -> Self {
        self.config.deps.strategy = strategy;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.deps.batch_size = size;
        self
    }

    pub fn binding(mut self, mode: BindingMode) -> Self {
        self.config.depot.binding = mode;
        self
    }

    pub fn on_dispatch_failure(mut self, policy: DispatchFailurePolicy) -> Self {
        self.config.depot.on_dispatch_failure = policy;
        self
    }

    pub fn binding_retention(mut self, retention: BindingRetention) -> Self {
        self.config.depot.binding_retention = retention;
        self
    }

    pub fn auto_input_deps(mut self, enabled: bool) -> Self {
        self.config.futures.auto_input_deps = enabled;
        self
    }

    pub fn topic(mut self, topic: &str) -> Self {
        self.config.events.topic = topic.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
