//! Data models for dataset resolution.
//!
//! This module contains the descriptor types that callers use to declare
//! datasets, the cache metadata written next to cached payloads, and the
//! keyed result of an aggregation run.

use crate::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The kind of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Json,
    Csv,
    Tsv,
    Psv,
    #[serde(alias = "yml")]
    Yaml,
    Geojson,
    Topojson,
    /// ArchieML text.
    Aml,
    #[serde(alias = "google-doc")]
    GoogleDocs,
    #[serde(alias = "google-sheet")]
    GoogleSheets,
    Airtable,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Json => "json",
            SourceType::Csv => "csv",
            SourceType::Tsv => "tsv",
            SourceType::Psv => "psv",
            SourceType::Yaml => "yaml",
            SourceType::Geojson => "geojson",
            SourceType::Topojson => "topojson",
            SourceType::Aml => "aml",
            SourceType::GoogleDocs => "google-docs",
            SourceType::GoogleSheets => "google-sheets",
            SourceType::Airtable => "airtable",
            SourceType::Unknown => "unknown",
        }
    }

    /// Types that can only be fetched over the network.
    pub fn is_remote_only(&self) -> bool {
        matches!(
            self,
            SourceType::GoogleDocs | SourceType::GoogleSheets | SourceType::Airtable
        )
    }

    /// Map a file extension onto a readable format.
    pub fn from_extension(ext: &str) -> Option<SourceType> {
        match ext.to_lowercase().as_str() {
            "json" => Some(SourceType::Json),
            "geojson" => Some(SourceType::Geojson),
            "topojson" => Some(SourceType::Topojson),
            "csv" => Some(SourceType::Csv),
            "tsv" => Some(SourceType::Tsv),
            "psv" => Some(SourceType::Psv),
            "yaml" | "yml" => Some(SourceType::Yaml),
            "aml" => Some(SourceType::Aml),
            _ => None,
        }
    }

    /// Whether datasets of this type can be written back out locally.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            SourceType::Json
                | SourceType::Geojson
                | SourceType::Topojson
                | SourceType::Csv
                | SourceType::Tsv
                | SourceType::Psv
                | SourceType::Yaml
        )
    }
}

/// Where to persist a local copy of a resolved dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalTarget {
    /// `true` writes `<name>.<ext>` into the local output directory.
    Enabled(bool),
    /// An explicit file name inside the local output directory.
    File(String),
}

impl LocalTarget {
    pub fn is_enabled(&self) -> bool {
        match self {
            LocalTarget::Enabled(flag) => *flag,
            LocalTarget::File(name) => !name.is_empty(),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            LocalTarget::File(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

/// Selects a sheet inside a spreadsheet by numeric id or by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Id(i64),
    Title(String),
}

/// A transformation applied to resolved data before it is returned.
#[derive(Clone)]
pub struct Postprocess(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl Postprocess {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, data: Value) -> Value {
        (self.0)(data)
    }
}

impl fmt::Debug for Postprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Postprocess(..)")
    }
}

/// Declarative description of one dataset.
///
/// `remote`, `source_type` and `ttl` are optional on input and always
/// filled in by [`crate::descriptor::parse_set`] before resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Local path, URL, or document/base identifier.
    #[serde(default, alias = "url", alias = "id", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,

    /// Free-form settings handed to the underlying reader or fetcher.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,

    /// Cache lifetime in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalTarget>,

    /// Airtable base id; falls back to `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Airtable table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Airtable view name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<SheetRef>,

    /// Column holding keys when a sheet is used as a key/value store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,

    /// Inline data, returned as-is without any fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip)]
    pub postprocess: Option<Postprocess>,
}

impl SourceDescriptor {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    pub fn with_postprocess(
        mut self,
        f: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.postprocess = Some(Postprocess::new(f));
        self
    }

    /// The concrete type; `Unknown` before normalization.
    pub fn kind(&self) -> SourceType {
        self.source_type.unwrap_or(SourceType::Unknown)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.unwrap_or(false)
    }

    /// The source string, or a configuration error naming the entry.
    pub fn require_source(&self) -> Result<&str, DataError> {
        self.source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DataError::Config("a `source` is required".to_string()))
    }

    /// Whether `options.noAuth` is set.
    pub fn no_auth(&self) -> bool {
        self.options
            .get("noAuth")
            .map(is_truthy)
            .unwrap_or(false)
    }

    pub fn wants_local(&self) -> bool {
        self.local.as_ref().map(LocalTarget::is_enabled).unwrap_or(false)
    }
}

/// Loose truthiness for option values written by hand in config files.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A dataset declaration: shorthand string or full descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorInput {
    Shorthand(String),
    Descriptor(SourceDescriptor),
}

impl From<&str> for DescriptorInput {
    fn from(s: &str) -> Self {
        DescriptorInput::Shorthand(s.to_string())
    }
}

impl From<String> for DescriptorInput {
    fn from(s: String) -> Self {
        DescriptorInput::Shorthand(s)
    }
}

impl From<SourceDescriptor> for DescriptorInput {
    fn from(d: SourceDescriptor) -> Self {
        DescriptorInput::Descriptor(d)
    }
}

/// How a cached payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheParser {
    /// Raw text, returned as a JSON string.
    String,
    /// JSON document.
    Json,
}

impl CacheParser {
    pub fn for_value(data: &Value) -> Self {
        if data.is_string() {
            CacheParser::String
        } else {
            CacheParser::Json
        }
    }
}

/// Contents of a `<name>.meta` cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    /// The normalized descriptor that produced the cached data.
    pub options: SourceDescriptor,
    pub created: DateTime<Utc>,
    pub parser: CacheParser,
}

/// Keyed outcome of an aggregation run.
#[derive(Debug, Default)]
pub struct AggregationResult {
    entries: BTreeMap<String, Result<Value, DataError>>,
}

impl AggregationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, outcome: Result<Value, DataError>) {
        self.entries.insert(name, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The resolved value for `name`, if it succeeded.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(|r| r.as_ref().ok())
    }

    /// The error for `name`, if it failed.
    pub fn error(&self, name: &str) -> Option<&DataError> {
        self.entries.get(name).and_then(|r| r.as_ref().err())
    }

    pub fn outcome(&self, name: &str) -> Option<&Result<Value, DataError>> {
        self.entries.get(name)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&String, &DataError)> {
        self.entries
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Successful entries as one JSON object, failures dropped.
    pub fn into_data(self) -> Map<String, Value> {
        self.entries
            .into_iter()
            .filter_map(|(name, r)| r.ok().map(|v| (name, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_type_aliases() {
        let t: SourceType = serde_json::from_str("\"google-doc\"").unwrap();
        assert_eq!(t, SourceType::GoogleDocs);
        let t: SourceType = serde_json::from_str("\"google-sheet\"").unwrap();
        assert_eq!(t, SourceType::GoogleSheets);
        let t: SourceType = serde_json::from_str("\"yml\"").unwrap();
        assert_eq!(t, SourceType::Yaml);
        let t: SourceType = serde_json::from_str("\"dbase\"").unwrap();
        assert_eq!(t, SourceType::Unknown);
    }

    #[test]
    fn test_source_type_remote_only() {
        assert!(SourceType::Airtable.is_remote_only());
        assert!(SourceType::GoogleSheets.is_remote_only());
        assert!(!SourceType::Csv.is_remote_only());
        assert_eq!(SourceType::GoogleDocs.to_string(), "google-docs");
    }

    #[test]
    fn test_descriptor_input_untagged() {
        let input: DescriptorInput = serde_json::from_value(json!("data.csv")).unwrap();
        assert!(matches!(input, DescriptorInput::Shorthand(ref s) if s == "data.csv"));

        let input: DescriptorInput = serde_json::from_value(json!({
            "url": "https://example.test/a.json",
            "type": "json",
            "keyColumn": "Key",
            "local": "a-out.json"
        }))
        .unwrap();
        match input {
            DescriptorInput::Descriptor(d) => {
                assert_eq!(d.source.as_deref(), Some("https://example.test/a.json"));
                assert_eq!(d.kind(), SourceType::Json);
                assert_eq!(d.key_column.as_deref(), Some("Key"));
                assert_eq!(d.local, Some(LocalTarget::File("a-out.json".to_string())));
            }
            other => panic!("expected descriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_no_auth_truthiness() {
        let d = SourceDescriptor::new("x").with_option("noAuth", json!(true));
        assert!(d.no_auth());
        let d = SourceDescriptor::new("x").with_option("noAuth", json!(0));
        assert!(!d.no_auth());
        assert!(!SourceDescriptor::new("x").no_auth());
    }

    #[test]
    fn test_local_target() {
        assert!(LocalTarget::Enabled(true).is_enabled());
        assert!(!LocalTarget::Enabled(false).is_enabled());
        assert_eq!(LocalTarget::File("a.csv".into()).file_name(), Some("a.csv"));
        assert_eq!(LocalTarget::Enabled(true).file_name(), None);
    }

    #[test]
    fn test_postprocess_apply() {
        let d = SourceDescriptor::new("x").with_postprocess(|v| json!({ "wrapped": v }));
        let out = d.postprocess.as_ref().unwrap().apply(json!(1));
        assert_eq!(out, json!({ "wrapped": 1 }));
    }

    #[test]
    fn test_aggregation_result_split() {
        let mut result = AggregationResult::new();
        result.insert("a".to_string(), Ok(json!({"x": 1})));
        result.insert("b".to_string(), Err(DataError::Config("missing".into())));

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("a"), Some(&json!({"x": 1})));
        assert!(result.get("b").is_none());
        assert!(result.error("b").is_some());
        assert_eq!(result.failure_count(), 1);

        let data = result.into_data();
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("a"));
    }
}
