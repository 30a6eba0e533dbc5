//! BI Harvester - per-application analytics metrics harvester
//!
//! A CLI tool that queries a fixed set of analytics endpoints for every
//! configured application and country, reduces each response to a few
//! statistics and accumulates them into a JSON report, optionally
//! exported as CSV.
//!
//! Exit codes:
//!   0 - Success (individual request failures are logged and skipped)
//!   1 - Configuration, credential or report file error

mod analysis;
mod auth;
mod cli;
mod config;
mod fetch;
mod models;
mod pipeline;
mod planner;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use fetch::HttpFetcher;
use models::{FetchDescriptor, RequestSpec};
use pipeline::{Pipeline, PipelineOptions};
use planner::RequestPlanner;
use report::ReportStore;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("BI Harvester v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Harvest failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .bi-harvester.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Add app_ids, countries and the [query] startDate/endDate before running.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber is already installed");
    }
}

/// Run the complete harvest workflow.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let output = config.general.output.clone();

    if args.export_only {
        let store = ReportStore::load(&output)?;
        return export(&args, &store);
    }

    // Configuration problems are fatal before any request is sent
    let planner = RequestPlanner::new(&config)?;
    let descriptors = planner.plan();

    if args.dry_run {
        return handle_dry_run(&config, &descriptors);
    }

    if let Some(ref refresh_token) = args.refresh_token {
        refresh_token_file(&config, refresh_token).await?;
    }

    let token = auth::load_bearer_token(&config.general.token_file)?;

    let mut store = if args.fresh {
        ReportStore::new()
    } else {
        ReportStore::load(&output)?
    };

    println!(
        "📡 Harvesting {} application(s), {} country(ies): {} requests",
        config.app_ids.len(),
        config.countries.len(),
        descriptors.len()
    );

    let fetcher = HttpFetcher::new(
        &config.general.base_url,
        &token,
        config.general.timeout_seconds,
    )?;
    let pipeline = Pipeline::new(
        fetcher,
        PipelineOptions {
            concurrency: config.general.concurrency,
            show_progress: !args.quiet,
        },
    );

    let summary = pipeline.run(&descriptors, &mut store).await;

    if args.fresh {
        store.persist(&output)?;
    } else {
        store.persist_merged(&output)?;
    }

    println!("\n📊 Harvest Summary:");
    println!("   Requests: {}", summary.planned);
    println!("   - ✅ Succeeded: {}", summary.succeeded);
    println!("   - ⚠️  Failed: {}", summary.failed);
    println!("   Duration: {:.1}s", summary.elapsed.as_secs_f64());
    println!("\n✅ Report saved to: {}", output.display());

    if summary.failed > 0 {
        warn!("{} request(s) were skipped, see the log above", summary.failed);
    }

    export(&args, &store)
}

/// Export the report as CSV when --export is given.
fn export(args: &Args, store: &ReportStore) -> Result<()> {
    if let Some(ref path) = args.export {
        let rows = report::export_csv(store.report(), path)?;
        println!("📄 Exported {} rows to {}", rows, path.display());
    }
    Ok(())
}

/// Exchange the refresh token and store the new id token.
async fn refresh_token_file(config: &Config, refresh_token: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.general.timeout_seconds))
        .build()
        .context("Failed to create HTTP client")?;

    let refreshed = auth::refresh_id_token(&client, &config.auth, refresh_token).await?;
    auth::store_bearer_token(&config.general.token_file, &refreshed.id_token)?;

    println!(
        "🔑 Refreshed id token written to {}",
        config.general.token_file.display()
    );
    if refreshed.rotated(refresh_token) {
        warn!("A new refresh token was issued; the one passed in is no longer current");
    }
    Ok(())
}

/// Handle --dry-run: print the planned requests and exit.
fn handle_dry_run(config: &Config, descriptors: &[FetchDescriptor]) -> Result<()> {
    println!("\n🔍 Dry run: {} planned requests (no API calls)...\n", descriptors.len());

    let base = fetch::client::parse_base_url(&config.general.base_url)?;
    for descriptor in descriptors {
        let url = fetch::request_url(&base, descriptor)?;
        println!(
            "   {} {} [{}]",
            descriptor.method(),
            url,
            descriptor.country_label()
        );
        if let RequestSpec::Json(ref payload) = descriptor.request {
            println!("       {}", serde_json::to_string(payload)?);
        }
    }

    println!("\n✅ Dry run complete. No requests were sent.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default()? {
        Some(config) => {
            info!("Loaded config from the working directory");
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
