// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::future::FutureId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Generic key-value miss. Callers decide what absence means.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Future already resolved: {0}")]
    AlreadyResolved(FutureId),

    #[error("Future not resolved: {0}")]
    NotResolved(FutureId),

    #[error("Store error: {0}")]
    Store(String),

    /// A queue or bus channel was closed by its owner.
    #[error("{0} closed")]
    Closed(String),

    #[error("Plugin data under key '{key}' has an unexpected type")]
    PluginData { key: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// True for the generic "no such key" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
