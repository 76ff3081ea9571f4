// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, DepotConfig, DepsConfig, RawConfigFile};
use crate::errors::{EngineError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EngineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let deps = validate_deps(&raw)?;
        let depot = validate_depot(&raw)?;
        validate_events(&raw)?;

        Ok(ConfigFile {
            deps,
            depot,
            events_topic: raw.events.topic,
            auto_input_deps: raw.futures.auto_input_deps,
            log_level: raw.logging.level,
        })
    }
}

fn validate_deps(cfg: &RawConfigFile) -> Result<DepsConfig> {
    let section = &cfg.deps;

    if section.batch_size == 0 {
        return Err(EngineError::ConfigError(
            "[deps].batch_size must be >= 1 (got 0)".to_string(),
        ));
    }

    let initializer_interval =
        non_zero_duration("[deps].initializer_interval", &section.initializer_interval)?;
    let scheduler_interval =
        non_zero_duration("[deps].scheduler_interval", &section.scheduler_interval)?;

    Ok(DepsConfig {
        strategy: section.strategy,
        initializer_interval,
        scheduler_interval,
        batch_size: section.batch_size,
    })
}

fn validate_depot(cfg: &RawConfigFile) -> Result<DepotConfig> {
    let section = &cfg.depot;
    let retry_backoff = parse_duration(&section.retry_backoff)
        .map_err(|e| EngineError::ConfigError(format!("[depot].retry_backoff: {e}")))?;

    Ok(DepotConfig {
        binding: section.binding,
        on_dispatch_failure: section.on_dispatch_failure,
        retry_backoff,
        binding_retention: section.binding_retention,
    })
}

fn validate_events(cfg: &RawConfigFile) -> Result<()> {
    if cfg.events.topic.trim().is_empty() {
        return Err(EngineError::ConfigError(
            "[events].topic must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn non_zero_duration(field: &str, raw: &str) -> Result<Duration> {
    let duration =
        parse_duration(raw).map_err(|e| EngineError::ConfigError(format!("{field}: {e}")))?;
    if duration.is_zero() {
        return Err(EngineError::ConfigError(format!(
            "{field} must be greater than zero (got '{raw}')"
        )));
    }
    Ok(duration)
}

/// Parse durations like `"250ms"`, `"3s"`, `"5m"`, `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
