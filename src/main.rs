//! build-data - dataset aggregation for template builds
//!
//! Resolves every entry of the `[data]` table in build-data.toml and writes
//! the combined result as a single JSON document.
//!
//! Exit codes:
//!   0 - Success (or entries failed without --fail-on-error)
//!   1 - Runtime error (config, output file, etc.)
//!   2 - At least one entry failed and --fail-on-error was set

mod cli;
mod config;

use anyhow::{Context, Result};
use build_data::sources::Credentials;
use build_data::{parse_set, DataAggregator};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up credentials from .env before anything reads the environment
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so `[general] verbose` can raise the level
    let (config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level(&args))?;

    info!("build-data v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match origin {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => warn!("No {} found, nothing to resolve", DEFAULT_CONFIG_FILE),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Build data failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default build-data.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

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
    println!("   Add your entries under [data] to start aggregating.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity settings.
fn init_logging(level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the aggregation. Returns the exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    if args.dry_run {
        return handle_dry_run(&config);
    }

    let entry_count = config.data.len();
    let aggregator = DataAggregator::new(config.to_aggregator_config(Credentials::from_env()))
        .context("Failed to set up the data aggregator")?;

    println!("📦 Resolving {} data entries...", entry_count);
    println!("   Cache: {}", config.general.cache_dir);
    if let Some(ref local_output) = config.general.local_output {
        println!("   Local copies: {}", local_output);
    }

    let spinner = (!args.quiet && !config.general.verbose).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("fetching...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = aggregator.fetch(config.data.clone()).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let total = result.len();
    let failed = result.failure_count();
    let failures: Vec<(String, String)> = result
        .failures()
        .map(|(name, e)| (name.clone(), format!("[{}] {}", e.kind(), e)))
        .collect();

    let output_path = Path::new(&config.general.output);
    write_output(output_path, Value::Object(result.into_data()))?;

    let duration = start_time.elapsed().as_secs_f64();

    println!("\n📊 Data Summary:");
    println!("   Entries: {}", total);
    println!("   ✅ Resolved: {} | ❌ Failed: {}", total - failed, failed);
    for (name, message) in &failures {
        println!("     • {}: {}", name, message);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Data written to: {}", output_path.display());

    if failed > 0 && args.fail_on_error {
        eprintln!(
            "\n⛔ {} of {} entries failed. Failing (exit code 2).",
            failed, total
        );
        return Ok(2);
    }

    Ok(0)
}

/// Write the aggregated data as pretty JSON, creating parent directories.
fn write_output(path: &Path, data: Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&data).context("Failed to serialize data")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write data to {}", path.display()))?;
    Ok(())
}

/// Handle --dry-run: normalize every entry and print it, without fetching.
fn handle_dry_run(config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: normalizing entries (no fetches)...\n");

    if config.data.is_empty() {
        println!("   No data entries configured.");
    }

    for (name, input) in &config.data {
        match parse_set(input.clone(), config.general.ttl_ms) {
            Ok(set) if set.data.is_some() => {
                println!("     📄 {}: inline data", name);
            }
            Ok(set) => {
                let origin = if set.is_remote() { "remote" } else { "local" };
                let source = set.source.as_deref().unwrap_or("-");
                let ttl = set.ttl.map(|t| format!("{}ms", t)).unwrap_or_default();
                println!(
                    "     📄 {}: {} {} {} (ttl {})",
                    name,
                    set.kind(),
                    origin,
                    source,
                    ttl
                );
            }
            Err(e) => {
                println!("     ❌ {}: {}", name, e);
            }
        }
    }

    println!("\n✅ Dry run complete. Nothing was fetched.");
    Ok(0)
}

/// Load configuration from file or use defaults, with CLI overrides applied.
///
/// Also returns the path the config came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, origin) = match args.config {
        Some(ref config_path) => (Config::load(config_path)?, Some(config_path.clone())),
        None => match Config::load_default()? {
            Some(config) => (config, Some(PathBuf::from(DEFAULT_CONFIG_FILE))),
            None => (Config::default(), None),
        },
    };

    config.merge_with_args(args);
    Ok((config, origin))
}
