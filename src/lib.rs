//! Fetch, cache and aggregate datasets for template builds.
//!
//! Each named entry in a data declaration resolves to a JSON value, from a
//! local file, an HTTP endpoint, Google Docs, Google Sheets or Airtable.
//! Remote results are cached on disk with a time-to-live.

pub mod aggregator;
pub mod archieml;
pub mod cache;
pub mod descriptor;
pub mod error;
pub mod formats;
pub mod local;
pub mod models;
pub mod persist;
pub mod sources;

pub use aggregator::{AggregatorConfig, DataAggregator};
pub use descriptor::{parse_set, DEFAULT_TTL_MS};
pub use error::DataError;
pub use models::{AggregationResult, DescriptorInput, SourceDescriptor, SourceType};
