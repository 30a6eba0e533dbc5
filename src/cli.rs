//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// BI Harvester - per-app analytics metrics harvester
///
/// Fetches release, level, engagement, monetization and retention metrics
/// for every configured application and country, aggregates them and
/// accumulates the results into a JSON report.
///
/// Examples:
///   bi-harvester
///   bi-harvester --config config.json --export output.csv
///   bi-harvester --app-ids com.example.game --countries France,Japan
///   bi-harvester --dry-run
///   bi-harvester --export-only --export output.csv
///   bi-harvester --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file (.toml or .json)
    ///
    /// If not specified, looks for .bi-harvester.toml, then config.json,
    /// in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path of the JSON report (loaded, merged into and written back)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// File holding the bearer token
    #[arg(long, value_name = "FILE", env = "BI_HARVESTER_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Base URL of the analytics API
    #[arg(long, value_name = "URL", env = "BI_HARVESTER_BASE_URL")]
    pub base_url: Option<String>,

    /// Application identifiers to harvest (comma-separated)
    ///
    /// Overrides the configured list.
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub app_ids: Option<Vec<String>>,

    /// Country names to harvest in addition to the global figures (comma-separated)
    ///
    /// Example: --countries "France,United States"
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// First day of the reporting window (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the reporting window (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<NaiveDate>,

    /// Number of concurrent requests
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Start from an empty report instead of merging into the existing one
    #[arg(long)]
    pub fresh: bool,

    /// Dry run: print the planned requests without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Write the final report as CSV to this file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Only export the existing report, without fetching anything
    #[arg(long, requires = "export")]
    pub export_only: bool,

    /// Exchange this refresh token for a new id token before the run
    ///
    /// The new token is written to the token file.
    #[arg(long, value_name = "TOKEN", env = "BI_HARVESTER_REFRESH_TOKEN")]
    pub refresh_token: Option<String>,

    /// Generate a default .bi-harvester.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!(
                    "End date {} is before start date {}",
                    end, start
                ));
            }
        }

        if let Some(ref ids) = self.app_ids {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err("Application ids must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
