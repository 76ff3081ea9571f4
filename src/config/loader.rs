// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "TASKWEAVE_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "taskweave.toml";

/// Deserialize the TOML at `path` without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&contents)?)
}

/// Read, apply defaults and validate the config at `path`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    debug!(path = %path.as_ref().display(), "config file loaded");
    ConfigFile::try_from(raw)
}

pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// `env` if set and non-empty, else `taskweave.toml` in the working directory.
pub fn resolve_config_path(env: Option<&str>) -> PathBuf {
    match env.map(str::trim) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Load the config named by `TASKWEAVE_CONFIG` (or the default file name).
///
/// A missing default file yields the built-in defaults; a missing file that
/// was named explicitly is an error.
pub fn load_default() -> Result<ConfigFile> {
    let env = std::env::var(CONFIG_ENV).ok();
    let path = resolve_config_path(env.as_deref());
    if env.is_none() && !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return ConfigFile::try_from(RawConfigFile::default());
    }
    load_and_validate(path)
}
