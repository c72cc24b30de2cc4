//! Configuration loading and config file resolution
//!
//! The TOML file is a bootstrap layer only: every value in it can be
//! overridden from the command line or the environment, and every value has
//! a compiled default, so running without a config file is normal.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TTX_CONFIG";

/// Default per-facet retry budget (R0)
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default number of items processed concurrently
pub const DEFAULT_CONCURRENCY: usize = 4;

pub const DEFAULT_OUTPUT: &str = "transcripts.jsonl";
pub const DEFAULT_DISCOVERED: &str = "all.jsonl";
pub const DEFAULT_LANGUAGES: &str = "en";
pub const DEFAULT_BASE_URL: &str = "https://www.ted.com";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub gather: GatherSection,

    #[serde(default)]
    pub remote: RemoteSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[gather]` section; every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatherSection {
    /// Required facet set (transcript languages)
    pub languages: Option<Vec<String>>,
    /// Per-facet retry budget
    pub max_retries: Option<u32>,
    /// Completion budget across all runs
    pub max_talks: Option<CompletionBudget>,
    /// Items processed concurrently
    pub concurrency: Option<usize>,
    /// Ledger / output stream
    pub output: Option<PathBuf>,
    /// Persisted skip log
    pub skip_log: Option<PathBuf>,
    /// Explicit catalog (CSV or JSON lines)
    pub input: Option<PathBuf>,
    /// Discovered talks (JSON lines, see `DiscoveredTalk`)
    pub discovered: Option<PathBuf>,
    /// Explicit item ids, overriding any catalog
    pub ids: Option<Vec<String>>,
}

/// `[remote]` section; every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSection {
    pub base_url: Option<String>,
    pub requests_per_second: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub user_agent: Option<String>,
}

/// Maximum number of completed items, counted across all runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionBudget {
    Limited(u64),
    #[default]
    Unbounded,
}

impl CompletionBudget {
    /// True while `completed` is still below the budget
    pub fn allows(&self, completed: usize) -> bool {
        match self {
            Self::Limited(max) => (completed as u64) < *max,
            Self::Unbounded => true,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::Limited(max) => Some(*max),
            Self::Unbounded => None,
        }
    }
}

impl FromStr for CompletionBudget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("all") {
            return Ok(Self::Unbounded);
        }
        match s.parse::<u64>() {
            Ok(0) => Err(Error::Config("completion budget must be positive".to_string())),
            Ok(n) => Ok(Self::Limited(n)),
            Err(_) => Err(Error::Config(format!(
                "invalid completion budget {:?} (expected a positive integer or \"unbounded\")",
                s
            ))),
        }
    }
}

impl fmt::Display for CompletionBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{}", n),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BudgetRepr {
    Count(i64),
    Word(String),
}

impl<'de> Deserialize<'de> for CompletionBudget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match BudgetRepr::deserialize(deserializer)? {
            BudgetRepr::Count(n) => n.to_string().parse().map_err(serde::de::Error::custom),
            BudgetRepr::Word(word) => word.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for CompletionBudget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Limited(n) => serializer.serialize_u64(*n),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl TomlConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
    }

    /// Resolve the bootstrap configuration
    ///
    /// Priority:
    /// 1. Command-line path (must exist)
    /// 2. `TTX_CONFIG` environment variable (must exist)
    /// 3. `<config_dir>/ttx/config.toml` if present
    /// 4. Compiled defaults
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            info!("Loading config from {} (command line)", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                info!("Loading config from {} ({})", path, CONFIG_ENV_VAR);
                return Self::load(Path::new(&path));
            }
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Platform config file location (`~/.config/ttx/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ttx").join("config.toml"))
}

/// Skip log path derived from the output path (`<output>.skipped.jsonl`)
pub fn default_skip_log_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_OUTPUT.into());
    name.push(".skipped.jsonl");
    output.with_file_name(name)
}
