// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use taskweave::EngineError;
use taskweave::config::{
    ConfigFile, load_and_validate, load_from_str, parse_duration, resolve_config_path,
};
use taskweave::types::{
    BindingMode, BindingRetention, DispatchFailurePolicy, LogLevel, ResolveStrategy,
};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(result: Result<ConfigFile, EngineError>, needle: &str) {
    match result {
        Err(EngineError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_file_uses_defaults() {
    let file = config_file("");
    let config = load_and_validate(file.path()).unwrap();

    assert_eq!(config.deps.strategy, ResolveStrategy::Batched);
    assert_eq!(config.deps.batch_size, 1024);
    assert_eq!(config.deps.initializer_interval, Duration::from_secs(1));
    assert_eq!(config.deps.scheduler_interval, Duration::from_secs(1));
    assert_eq!(config.depot.binding, BindingMode::Separate);
    assert_eq!(config.depot.on_dispatch_failure, DispatchFailurePolicy::Rollback);
    assert_eq!(config.depot.binding_retention, BindingRetention::Keep);
    assert_eq!(config.depot.retry_backoff, Duration::from_millis(100));
    assert_eq!(config.events_topic, "tasks");
    assert!(config.auto_input_deps);
    assert_eq!(config.log_level, None);
}

#[test]
fn full_file_is_resolved() {
    let file = config_file(
        r#"
[deps]
strategy = "instant"
initializer_interval = "250ms"
scheduler_interval = "2s"
batch_size = 64

[depot]
binding = "transactional"
on_dispatch_failure = "drop"
retry_backoff = "5ms"
binding_retention = "release"

[events]
topic = "lifecycle"

[futures]
auto_input_deps = false

[logging]
level = "debug"
"#,
    );
    let config = load_and_validate(file.path()).unwrap();

    assert_eq!(config.deps.strategy, ResolveStrategy::Instant);
    assert_eq!(config.deps.initializer_interval, Duration::from_millis(250));
    assert_eq!(config.deps.scheduler_interval, Duration::from_secs(2));
    assert_eq!(config.deps.batch_size, 64);
    assert_eq!(config.depot.binding, BindingMode::Transactional);
    assert_eq!(config.depot.on_dispatch_failure, DispatchFailurePolicy::Drop);
    assert_eq!(config.depot.retry_backoff, Duration::from_millis(5));
    assert_eq!(config.depot.binding_retention, BindingRetention::Release);
    assert_eq!(config.events_topic, "lifecycle");
    assert!(!config.auto_input_deps);
    assert_eq!(config.log_level, Some(LogLevel::Debug));
}

#[test]
fn zero_batch_size_is_rejected() {
    let result = load_from_str("[deps]\nbatch_size = 0\n");
    expect_config_error(result, "batch_size");
}

#[test]
fn zero_interval_is_rejected() {
    let result = load_from_str("[deps]\nscheduler_interval = \"0s\"\n");
    expect_config_error(result, "scheduler_interval");
}

#[test]
fn malformed_duration_is_rejected() {
    let result = load_from_str("[depot]\nretry_backoff = \"soon\"\n");
    expect_config_error(result, "retry_backoff");

    let result = load_from_str("[deps]\ninitializer_interval = \"10 fortnights\"\n");
    expect_config_error(result, "unsupported duration unit");
}

#[test]
fn oversized_duration_is_rejected() {
    let result = load_from_str("[deps]\nscheduler_interval = \"18446744073709551615h\"\n");
    expect_config_error(result, "too large");

    let result = load_from_str("[depot]\nretry_backoff = \"18446744073709551615m\"\n");
    expect_config_error(result, "retry_backoff");

    assert!(parse_duration("18446744073709551615ms").is_ok());
    assert!(parse_duration("18446744073709551616s").is_err());
}

#[test]
fn blank_topic_is_rejected() {
    let result = load_from_str("[events]\ntopic = \"  \"\n");
    expect_config_error(result, "topic");
}

#[test]
fn unknown_strategy_is_a_toml_error() {
    let result = load_from_str("[deps]\nstrategy = \"eventually\"\n");
    assert!(matches!(result, Err(EngineError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/taskweave.toml");
    assert!(matches!(result, Err(EngineError::IoError(_))));
}

#[test]
fn parse_duration_units() {
    assert_eq!(parse_duration("15ms").unwrap(), Duration::from_millis(15));
    assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("42").is_err());
}

#[test]
fn config_path_prefers_env_value() {
    assert_eq!(
        resolve_config_path(Some("/etc/taskweave/prod.toml")),
        PathBuf::from("/etc/taskweave/prod.toml")
    );
    assert_eq!(resolve_config_path(Some("  ")), PathBuf::from("taskweave.toml"));
    assert_eq!(resolve_config_path(None), PathBuf::from("taskweave.toml"));
}
