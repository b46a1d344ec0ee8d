//! Command-line interface argument parsing.
//!
//! Flags given here take precedence over `build-data.toml`.

use clap::Parser;
use std::path::PathBuf;

/// build-data - fetch, cache and aggregate datasets for template builds
///
/// Reads the `[data]` table of build-data.toml, resolves every entry from
/// local files, HTTP, Google Docs, Google Sheets or Airtable, and writes
/// the combined result as one JSON document.
///
/// Examples:
///   build-data
///   build-data --config site/build-data.toml --output dist/data.json
///   build-data --no-cache --local-output data/
///   build-data --dry-run
///   build-data --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for build-data.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file for the aggregated JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for cached remote responses
    #[arg(long, value_name = "DIR", env = "BUILD_DATA_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for local copies of entries marked `local`
    #[arg(long, value_name = "DIR")]
    pub local_output: Option<PathBuf>,

    /// Default cache lifetime in milliseconds
    #[arg(long, value_name = "MS")]
    pub ttl: Option<u64>,

    /// Skip the initial cache lookup and always fetch remote entries
    #[arg(long)]
    pub no_cache: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 when any entry fails to resolve
    #[arg(long)]
    pub fail_on_error: bool,

    /// Dry run: print the normalized entries without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default build-data.toml configuration file
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

        if let Some(ref config) = self.config {
            if !config.is_file() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        if let Some(ref output) = self.output {
            if output.as_os_str().is_empty() || output.is_dir() {
                return Err(format!("Output must be a file path: {}", output.display()));
            }
        }

        if let Some(ref local_output) = self.local_output {
            if local_output.is_file() {
                return Err(format!(
                    "Local output path is a file, not a directory: {}",
                    local_output.display()
                ));
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
