// src/config/mod.rs

//! Configuration loading and validation for taskweave.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and resolve raw values into typed settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    CONFIG_ENV, load_and_validate, load_default, load_from_path, load_from_str,
    resolve_config_path,
};
pub use model::{
    ConfigFile, DepotConfig, DepotSection, DepsConfig, DepsSection, EventsSection,
    FuturesSection, LoggingSection, RawConfigFile,
};
pub use validate::parse_duration;
