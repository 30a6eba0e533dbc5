//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.bi-harvester.toml` files. JSON files in the legacy
//! `config.json` layout (`default_params`, `countries`, `appIDs`)
//! are accepted as well.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".bi-harvester.toml";

/// Legacy configuration file name, tried after the default one.
pub const LEGACY_CONFIG_FILE: &str = "config.json";

/// Fatal configuration problems, reported before any request is issued.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing `{0}` in the query parameters")]
    MissingDate(&'static str),

    #[error("endDate {end} is before startDate {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("startDate {0} has no preceding day")]
    DateRange(NaiveDate),

    #[error("no application ids configured")]
    NoApplications,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("bearer token file not found: {0}")]
    MissingToken(PathBuf),

    #[error("bearer token file is empty: {0}")]
    EmptyToken(PathBuf),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Country names harvested in addition to the global figures.
    #[serde(default)]
    pub countries: Vec<String>,

    /// Application identifiers to harvest.
    #[serde(default, alias = "appIDs")]
    pub app_ids: Vec<String>,

    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Shared request parameters.
    #[serde(default, alias = "default_params")]
    pub query: QueryConfig,

    /// Country name to ISO code overrides for the retention geography filter.
    #[serde(default)]
    pub country_codes: BTreeMap<String, String>,

    /// Token refresh settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report file path.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// File holding the bearer token.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// Analytics API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of concurrent requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            token_file: default_token_file(),
            base_url: default_base_url(),
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("output.json")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("bearer_token.txt")
}

fn default_base_url() -> String {
    "https://bi-apis.sonatgame.com/".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_timeout() -> u64 {
    60
}

/// Query parameters the planner fills in for each request.
pub const PER_REQUEST_PARAMS: [&str; 2] = ["appId", "country"];

/// Request parameters shared by every GET endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// First day of the reporting window.
    #[serde(
        rename = "startDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,

    /// Last day of the reporting window.
    #[serde(rename = "endDate", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Any other parameters, forwarded verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl QueryConfig {
    /// The configured reporting window.
    pub fn window(&self) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let start = self.start_date.ok_or(ConfigError::MissingDate("startDate"))?;
        let end = self.end_date.ok_or(ConfigError::MissingDate("endDate"))?;
        if end < start {
            return Err(ConfigError::DateOrder { start, end });
        }
        Ok((start, end))
    }

    /// Query-string parameters: dates first, then extra keys in sorted order.
    ///
    /// `appId` and `country` are set per request, so configured values for
    /// them are dropped.
    pub fn params(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let (start, end) = self.window()?;
        let mut params = vec![
            ("startDate".to_string(), start.to_string()),
            ("endDate".to_string(), end.to_string()),
        ];
        let extra = self
            .extra
            .iter()
            .filter(|(key, _)| !PER_REQUEST_PARAMS.contains(&key.as_str()));
        params.extend(extra.map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        }));
        Ok(params)
    }
}

/// Id token refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secure token endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// API key appended to the token endpoint as `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            api_key: None,
        }
    }
}

fn default_token_url() -> String {
    "https://securetoken.googleapis.com/v1/token".to_string()
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(config)
    }

    /// Try to load configuration from the default locations.
    ///
    /// Returns `Ok(None)` if no file exists, `Err` if one exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        for name in [DEFAULT_CONFIG_FILE, LEGACY_CONFIG_FILE] {
            let path = Path::new(name);
            if path.exists() {
                return Ok(Some(Self::load(path)?));
            }
        }
        Ok(None)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.clone();
        }
        if let Some(ref token_file) = args.token_file {
            self.general.token_file = token_file.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.general.base_url = base_url.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }

        if let Some(ref app_ids) = args.app_ids {
            self.app_ids = app_ids.clone();
        }
        if let Some(ref countries) = args.countries {
            self.countries = countries.clone();
        }

        if args.start_date.is_some() {
            self.query.start_date = args.start_date;
        }
        if args.end_date.is_some() {
            self.query.end_date = args.end_date;
        }
    }

    /// Check everything a harvest run needs before the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.query.window()?;
        if self.app_ids.is_empty() {
            return Err(ConfigError::NoApplications);
        }
        if self.general.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
