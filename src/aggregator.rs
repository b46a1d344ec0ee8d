//! Dataset aggregation.
//!
//! [`DataAggregator`] resolves a keyed set of descriptors concurrently.
//! Every entry settles on its own: one failing entry never prevents the
//! others from resolving, and its error is reported under its own name.

use crate::cache::DiskCache;
use crate::descriptor::{parse_set, DEFAULT_TTL_MS};
use crate::error::DataError;
use crate::local;
use crate::models::{AggregationResult, DescriptorInput, SourceDescriptor};
use crate::persist;
use crate::sources::{RemoteSettings, SourceRegistry};
use futures::future::join_all;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Settings for an aggregation run.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Directory holding `<name>.meta` / `<name>.data` cache pairs.
    pub cache_dir: PathBuf,
    /// Default cache lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Skip the cache lookup before remote fetches (results are still cached).
    pub ignore_initial_cache: bool,
    /// Where `local` copies of resolved datasets are written.
    pub local_output: Option<PathBuf>,
    /// Base for relative local sources; the working directory when unset.
    pub base_dir: Option<PathBuf>,
    pub remote: RemoteSettings,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache-build-data"),
            ttl_ms: DEFAULT_TTL_MS,
            ignore_initial_cache: false,
            local_output: None,
            base_dir: None,
            remote: RemoteSettings::default(),
        }
    }
}

/// Resolves named datasets from local files and remote sources.
pub struct DataAggregator {
    config: AggregatorConfig,
    cache: DiskCache,
    registry: SourceRegistry,
}

impl DataAggregator {
    /// Create an aggregator with the standard remote sources.
    pub fn new(config: AggregatorConfig) -> Result<Self, DataError> {
        let registry = SourceRegistry::standard(&config.remote)?;
        Self::with_registry(config, registry)
    }

    /// Create an aggregator with a caller-supplied source table.
    pub fn with_registry(config: AggregatorConfig, registry: SourceRegistry) -> Result<Self, DataError> {
        let cache = DiskCache::new(&config.cache_dir)?;
        if let Some(ref local_output) = config.local_output {
            fs::create_dir_all(local_output)?;
        }

        Ok(Self {
            config,
            cache,
            registry,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Resolve every entry concurrently and collect the outcomes by name.
    pub async fn fetch<I, K, D>(&self, entries: I) -> AggregationResult
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<DescriptorInput>,
    {
        let entries: Vec<(String, DescriptorInput)> = entries
            .into_iter()
            .map(|(name, input)| (name.into(), input.into()))
            .collect();

        let mut result = AggregationResult::new();
        if entries.is_empty() {
            info!("No data provided");
            return result;
        }

        debug!("Resolving {} data entries", entries.len());

        let pending = entries.into_iter().map(|(name, input)| async move {
            let outcome = self.resolve_entry(&name, input).await;
            if let Err(ref e) = outcome {
                error!("Failed to resolve {}: {}", name, e);
            }
            (name, outcome)
        });

        for (name, outcome) in join_all(pending).await {
            result.insert(name, outcome);
        }
        result
    }

    /// Resolve one named entry: normalize, fetch, postprocess, save locally.
    pub async fn resolve_entry(&self, name: &str, input: DescriptorInput) -> Result<Value, DataError> {
        let set = parse_set(input, self.config.ttl_ms)?;

        if let Some(data) = set.data {
            return Ok(data);
        }

        let data = self.fetch_set(&set, name).await?;
        let data = match &set.postprocess {
            Some(postprocess) => postprocess.apply(data),
            None => data,
        };

        if let Err(e) = persist::save_local(&data, &set, name, self.config.local_output.as_deref()) {
            warn!("Could not save local copy of {}: {}", name, e);
        }

        Ok(data)
    }

    /// Resolve a normalized descriptor without postprocessing.
    pub async fn fetch_set(&self, set: &SourceDescriptor, name: &str) -> Result<Value, DataError> {
        if name.is_empty() {
            return Err(DataError::Config("an entry name is needed to fetch a set".to_string()));
        }

        if set.is_remote() {
            self.fetch_remote_set(set, name).await
        } else {
            local::read_local(set, self.config.base_dir.as_deref())
        }
    }

    async fn fetch_remote_set(&self, set: &SourceDescriptor, name: &str) -> Result<Value, DataError> {
        if !self.config.ignore_initial_cache {
            if let Some(cached) = self.cache.get(name, set) {
                info!("Using cache for {}", name);
                return Ok(cached);
            }
        }

        info!("No cache, fetching {}", name);
        let data = self.registry.fetch(set).await?;

        if !data.is_null() {
            if let Err(e) = self.cache.set(name, &data, set) {
                warn!("Could not cache {}: {}", name, e);
            }
        }
        Ok(data)
    }
}
