//! Tests for config file resolution and parsing
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TTX_CONFIG are marked with #[serial].

use serial_test::serial;
use std::env;
use tempfile::TempDir;
use ttx_common::config::{CompletionBudget, TomlConfig, CONFIG_ENV_VAR};
use ttx_common::Error;

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"
file = "ttx.log"

[gather]
languages = ["en", "fr"]
max_retries = 2
max_talks = 5
concurrency = 8
output = "out/transcripts.jsonl"
ids = ["1136", "some_talk"]

[remote]
base_url = "http://localhost:9999"
requests_per_second = 10
"#;

#[test]
fn test_full_config_parses() {
    let config: TomlConfig = toml::from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.gather.languages, Some(vec!["en".to_string(), "fr".to_string()]));
    assert_eq!(config.gather.max_retries, Some(2));
    assert_eq!(config.gather.max_talks, Some(CompletionBudget::Limited(5)));
    assert_eq!(config.gather.concurrency, Some(8));
    assert_eq!(config.gather.ids.as_ref().map(Vec::len), Some(2));
    assert_eq!(config.remote.base_url.as_deref(), Some("http://localhost:9999"));
    assert_eq!(config.remote.max_attempts, None);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config: TomlConfig = toml::from_str("").unwrap();
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert!(config.gather.languages.is_none());
    assert!(config.gather.max_talks.is_none());
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let temp_dir = TempDir::new().unwrap();
    let cli_path = temp_dir.path().join("cli.toml");
    let env_path = temp_dir.path().join("env.toml");
    std::fs::write(&cli_path, "[gather]\nmax_retries = 3\n").unwrap();
    std::fs::write(&env_path, "[gather]\nmax_retries = 7\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = TomlConfig::resolve(Some(&cli_path)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.gather.max_retries, Some(3));
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    std::fs::write(&env_path, "[gather]\nmax_retries = 7\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = TomlConfig::resolve(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.gather.max_retries, Some(7));
}

#[test]
#[serial]
fn test_explicit_missing_file_is_fatal() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");

    let result = TomlConfig::resolve(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unparseable_file_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[gather\nmax_retries = ").unwrap();

    assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
}
