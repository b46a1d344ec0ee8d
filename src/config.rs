//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `build-data.toml` files.

use anyhow::{Context, Result};
use build_data::models::DescriptorInput;
use build_data::sources::{Credentials, RemoteSettings};
use build_data::{AggregatorConfig, DEFAULT_TTL_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "build-data.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Google API endpoints.
    #[serde(default)]
    pub google: GoogleConfig,

    /// Airtable API settings.
    #[serde(default)]
    pub airtable: AirtableConfig,

    /// Named data entries: a shorthand string or a descriptor table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, DescriptorInput>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Aggregated JSON output file.
    #[serde(default = "default_output")]
    pub output: String,

    /// Cache directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Directory for local copies of entries marked `local`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_output: Option<String>,

    /// Default cache lifetime in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Always fetch remote entries, ignoring what is already cached.
    #[serde(default)]
    pub ignore_initial_cache: bool,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            cache_dir: default_cache_dir(),
            local_output: None,
            ttl_ms: default_ttl_ms(),
            ignore_initial_cache: false,
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "build-data.json".to_string()
}

fn default_cache_dir() -> String {
    ".cache-build-data".to_string()
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("build-data/{}", env!("CARGO_PKG_VERSION"))
}

/// Google API endpoints, overridable for proxies and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,

    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            drive_api_base: default_drive_api_base(),
            sheets_api_base: default_sheets_api_base(),
        }
    }
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

/// Airtable API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtableConfig {
    #[serde(default = "default_airtable_api_base")]
    pub api_base: String,

    /// Records per page (Airtable caps this at 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_base: default_airtable_api_base(),
            page_size: default_page_size(),
        }
    }
}

fn default_airtable_api_base() -> String {
    "https://api.airtable.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

const EXAMPLE_DATA: &str = r#"
# [data]
# title = "data/title.json"
# stations = { source = "https://example.com/stations.csv", ttl = 3600000, local = true }
# copy = { source = "https://docs.google.com/document/d/DOC_ID", options = { noAuth = true } }
# crew = { type = "airtable", base = "appXXXXXXXX", table = "Crew", view = "Grid view" }
"#;

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref cache_dir) = args.cache_dir {
            self.general.cache_dir = cache_dir.display().to_string();
        }
        if let Some(ref local_output) = args.local_output {
            self.general.local_output = Some(local_output.display().to_string());
        }
        if let Some(ttl) = args.ttl {
            self.general.ttl_ms = ttl;
        }

        // Flags always override
        if args.no_cache {
            self.general.ignore_initial_cache = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level once the file and the CLI are merged: `--quiet` wins,
    /// then `verbose` from either source.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if !args.quiet && self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Settings for the aggregator, with credentials taken from `credentials`.
    pub fn to_aggregator_config(&self, credentials: Credentials) -> AggregatorConfig {
        AggregatorConfig {
            cache_dir: PathBuf::from(&self.general.cache_dir),
            ttl_ms: self.general.ttl_ms,
            ignore_initial_cache: self.general.ignore_initial_cache,
            local_output: self.general.local_output.as_ref().map(PathBuf::from),
            base_dir: None,
            remote: RemoteSettings {
                timeout_seconds: self.http.timeout_seconds,
                user_agent: self.http.user_agent.clone(),
                google_drive_api_base: self.google.drive_api_base.clone(),
                google_sheets_api_base: self.google.sheets_api_base.clone(),
                airtable_api_base: self.airtable.api_base.clone(),
                airtable_page_size: self.airtable.page_size,
                credentials,
            },
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        let mut content = toml::to_string_pretty(&config).unwrap_or_else(|_| String::new());
        content.push_str(EXAMPLE_DATA);
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_data::models::{LocalTarget, SourceType};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "build-data.json");
        assert_eq!(config.general.cache_dir, ".cache-build-data");
        assert_eq!(config.general.ttl_ms, 600_000);
        assert_eq!(config.http.timeout_seconds, 60);
        assert_eq!(config.airtable.page_size, 100);
        assert!(config.data.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "dist/data.json"
local_output = "data"
ttl_ms = 5000

[airtable]
page_size = 50

[data]
title = "data/title.json"
stations = { url = "https://example.com/stations.csv", ttl = 1000, local = "stations.csv" }

[data.crew]
type = "airtable"
base = "app123"
table = "Crew"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "dist/data.json");
        assert_eq!(config.general.local_output.as_deref(), Some("data"));
        assert_eq!(config.general.ttl_ms, 5000);
        assert_eq!(config.general.cache_dir, ".cache-build-data");
        assert_eq!(config.airtable.page_size, 50);
        assert_eq!(config.data.len(), 3);

        assert!(matches!(
            config.data.get("title"),
            Some(DescriptorInput::Shorthand(s)) if s == "data/title.json"
        ));
        match config.data.get("stations") {
            Some(DescriptorInput::Descriptor(d)) => {
                assert_eq!(d.source.as_deref(), Some("https://example.com/stations.csv"));
                assert_eq!(d.ttl, Some(1000));
                assert_eq!(d.local, Some(LocalTarget::File("stations.csv".to_string())));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        match config.data.get("crew") {
            Some(DescriptorInput::Descriptor(d)) => {
                assert_eq!(d.source_type, Some(SourceType::Airtable));
                assert_eq!(d.table.as_deref(), Some("Crew"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_merge_with_args() {
        use crate::cli::Args;
        use clap::Parser;

        let mut config = Config::default();
        let args = Args::parse_from([
            "build-data",
            "--output",
            "out.json",
            "--ttl",
            "42",
            "--no-cache",
            "--local-output",
            "saved",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.general.output, "out.json");
        assert_eq!(config.general.ttl_ms, 42);
        assert!(config.general.ignore_initial_cache);
        assert_eq!(config.general.local_output.as_deref(), Some("saved"));
        assert_eq!(config.general.cache_dir, ".cache-build-data");
    }

    #[test]
    fn test_log_level_from_file() {
        use crate::cli::Args;
        use clap::Parser;

        let mut config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        let args = Args::parse_from(["build-data"]);
        config.merge_with_args(&args);
        assert_eq!(config.log_level(&args), tracing::Level::DEBUG);

        let quiet = Args::parse_from(["build-data", "--quiet"]);
        assert_eq!(config.log_level(&quiet), tracing::Level::ERROR);

        assert_eq!(Config::default().log_level(&args), tracing::Level::INFO);
    }

    #[test]
    fn test_to_aggregator_config() {
        let mut config = Config::default();
        config.general.local_output = Some("data".to_string());
        config.airtable.api_base = "http://127.0.0.1:9999".to_string();

        let agg = config.to_aggregator_config(Credentials::default());
        assert_eq!(agg.cache_dir, PathBuf::from(".cache-build-data"));
        assert_eq!(agg.local_output, Some(PathBuf::from("data")));
        assert_eq!(agg.remote.airtable_api_base, "http://127.0.0.1:9999");
        assert!(agg.remote.credentials.airtable_api_key.is_none());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[http]"));
        assert!(toml_str.contains("# [data]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.general.output, "build-data.json");
        assert!(parsed.data.is_empty());
    }
}
