//! Gather settings resolution
//!
//! Merges command-line overrides (which already carry `TTX_*` environment
//! values via clap) over the TOML bootstrap file over compiled defaults.

use crate::remote::HttpFetcherConfig;
use crate::work_source::WorkSource;
use std::path::PathBuf;
use tracing::info;
use ttx_common::config::{
    default_skip_log_path, CompletionBudget, TomlConfig, DEFAULT_CONCURRENCY, DEFAULT_DISCOVERED,
    DEFAULT_LANGUAGES, DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT,
};
use ttx_common::{Error, FacetSet, Result};

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Comma-separated language codes
    pub languages: Option<String>,
    pub max_retries: Option<u32>,
    pub max_talks: Option<CompletionBudget>,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub skip_log: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub discovered: Option<PathBuf>,
    pub ids: Vec<String>,
    pub recheck_skipped: bool,
}

/// Where candidate items come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Ids(Vec<String>),
    Catalog(PathBuf),
    Discovered(PathBuf),
}

/// Fully resolved settings for one gather run
#[derive(Debug, Clone)]
pub struct GatherSettings {
    pub required: FacetSet,
    /// Per-facet retry budget (R0)
    pub max_retries: u32,
    pub budget: CompletionBudget,
    pub concurrency: usize,
    pub output: PathBuf,
    pub skip_log: PathBuf,
    /// Ignore earlier skip decisions and check those items again
    pub recheck_skipped: bool,
    pub input: InputSource,
    pub remote: HttpFetcherConfig,
}

impl GatherSettings {
    /// Settings with defaults for everything but the required set and input
    pub fn new(required: FacetSet, input: InputSource) -> Self {
        let output = PathBuf::from(DEFAULT_OUTPUT);
        Self {
            required,
            max_retries: DEFAULT_MAX_RETRIES,
            budget: CompletionBudget::Unbounded,
            concurrency: DEFAULT_CONCURRENCY,
            skip_log: default_skip_log_path(&output),
            output,
            recheck_skipped: false,
            input,
            remote: HttpFetcherConfig::default(),
        }
    }

    /// Resolve settings with priority overrides > TOML > defaults
    ///
    /// # Errors
    /// `Error::Config` for an empty language set, a zero retry budget or a
    /// zero concurrency.
    pub fn resolve(overrides: ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let section = &toml.gather;

        let languages = match (&overrides.languages, &section.languages) {
            (Some(cli), _) => cli.clone(),
            (None, Some(list)) => list.join(","),
            (None, None) => DEFAULT_LANGUAGES.to_string(),
        };
        let required = FacetSet::parse_required(&languages)?;

        let max_retries = overrides
            .max_retries
            .or(section.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }

        let concurrency = overrides
            .concurrency
            .or(section.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        let budget = overrides.max_talks.or(section.max_talks).unwrap_or_default();

        let output = overrides
            .output
            .or_else(|| section.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        let skip_log = overrides
            .skip_log
            .or_else(|| section.skip_log.clone())
            .unwrap_or_else(|| default_skip_log_path(&output));

        let ids = if overrides.ids.is_empty() {
            section.ids.clone().unwrap_or_default()
        } else {
            overrides.ids
        };
        let input = if !ids.is_empty() {
            InputSource::Ids(ids)
        } else if let Some(path) = overrides.input.or_else(|| section.input.clone()) {
            InputSource::Catalog(path)
        } else {
            InputSource::Discovered(
                overrides
                    .discovered
                    .or_else(|| section.discovered.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DISCOVERED)),
            )
        };

        let settings = Self {
            required,
            max_retries,
            budget,
            concurrency,
            output,
            skip_log,
            recheck_skipped: overrides.recheck_skipped,
            input,
            remote: HttpFetcherConfig::from_section(&toml.remote),
        };

        info!(
            languages = %settings.required,
            max_retries = settings.max_retries,
            budget = %settings.budget,
            concurrency = settings.concurrency,
            output = %settings.output.display(),
            "Gather settings resolved"
        );

        Ok(settings)
    }

    /// Open the configured work source
    ///
    /// # Errors
    /// `Error::Catalog` if a catalog or discovered file cannot be opened.
    pub fn work_source(&self) -> Result<WorkSource> {
        match &self.input {
            InputSource::Ids(ids) => Ok(WorkSource::from_ids(ids.clone(), &self.required)),
            InputSource::Catalog(path) => WorkSource::from_catalog(path, &self.required),
            InputSource::Discovered(path) => WorkSource::from_discovered(path, &self.required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_toml() {
        let settings = GatherSettings::resolve(ConfigOverrides::default(), &TomlConfig::default()).unwrap();

        assert_eq!(settings.required, FacetSet::parse_list("en").unwrap());
        assert_eq!(settings.max_retries, 10);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.budget, CompletionBudget::Unbounded);
        assert_eq!(settings.output, PathBuf::from("transcripts.jsonl"));
        assert_eq!(settings.skip_log, PathBuf::from("transcripts.jsonl.skipped.jsonl"));
        assert_eq!(settings.input, InputSource::Discovered(PathBuf::from("all.jsonl")));
    }

    #[test]
    fn test_overrides_beat_toml() {
        let toml: TomlConfig = toml::from_str(
            r#"
            [gather]
            languages = ["en", "fr"]
            max_retries = 3
            max_talks = 20
            output = "from_toml.jsonl"
            input = "talks.csv"
            "#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            languages: Some("de,es".to_string()),
            max_talks: Some(CompletionBudget::Limited(5)),
            ..Default::default()
        };
        let settings = GatherSettings::resolve(overrides, &toml).unwrap();

        assert_eq!(settings.required, FacetSet::parse_list("de,es").unwrap());
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.budget, CompletionBudget::Limited(5));
        assert_eq!(settings.output, PathBuf::from("from_toml.jsonl"));
        assert_eq!(settings.skip_log, PathBuf::from("from_toml.jsonl.skipped.jsonl"));
        assert_eq!(settings.input, InputSource::Catalog(PathBuf::from("talks.csv")));
    }

    #[test]
    fn test_ids_take_priority_over_catalog() {
        let overrides = ConfigOverrides {
            ids: vec!["1136".to_string()],
            input: Some(PathBuf::from("talks.csv")),
            ..Default::default()
        };
        let settings = GatherSettings::resolve(overrides, &TomlConfig::default()).unwrap();
        assert_eq!(settings.input, InputSource::Ids(vec!["1136".to_string()]));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let empty_languages = ConfigOverrides {
            languages: Some(" , ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            GatherSettings::resolve(empty_languages, &TomlConfig::default()),
            Err(Error::Config(_))
        ));

        let zero_retries = ConfigOverrides {
            max_retries: Some(0),
            ..Default::default()
        };
        assert!(GatherSettings::resolve(zero_retries, &TomlConfig::default()).is_err());

        let zero_concurrency = ConfigOverrides {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(GatherSettings::resolve(zero_concurrency, &TomlConfig::default()).is_err());
    }
}
