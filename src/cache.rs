//! TTL disk cache for remote datasets.
//!
//! Each entry is a pair of files in the cache directory: `<name>.meta`
//! holding a JSON [`CacheMeta`] and `<name>.data` holding the payload.
//! Entries are never evicted; staleness is checked when they are read.

use crate::error::DataError;
use crate::models::{CacheMeta, CacheParser, SourceDescriptor};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Disk-backed cache keyed by entry name.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DataError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.meta", file_stem(name)))
    }

    pub fn data_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.data", file_stem(name)))
    }

    /// Fresh cached data for `name`, or `None` on a miss.
    ///
    /// Missing, expired and corrupt entries are all misses.
    pub fn get(&self, name: &str, set: &SourceDescriptor) -> Option<Value> {
        self.get_at(name, set, Utc::now())
    }

    pub fn get_at(&self, name: &str, set: &SourceDescriptor, now: DateTime<Utc>) -> Option<Value> {
        match self.read_entry(name, set, now) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Ignoring cache for {}: {}", name, e);
                None
            }
        }
    }

    /// Store `data` for `name`, overwriting any previous entry.
    pub fn set(&self, name: &str, data: &Value, set: &SourceDescriptor) -> Result<(), DataError> {
        self.set_at(name, data, set, Utc::now())
    }

    pub fn set_at(
        &self,
        name: &str,
        data: &Value,
        set: &SourceDescriptor,
        created: DateTime<Utc>,
    ) -> Result<(), DataError> {
        let meta = CacheMeta {
            options: set.clone(),
            created,
            parser: CacheParser::for_value(data),
        };

        let payload = match data {
            Value::String(text) => text.clone(),
            other => serde_json::to_string(other).map_err(|e| self.corrupt(name, e))?,
        };
        let meta = serde_json::to_string(&meta).map_err(|e| self.corrupt(name, e))?;

        // Meta goes last so a failed data write never leaves a fresh
        // timestamp beside an older payload.
        let meta_path = self.meta_path(name);
        if let Err(e) = fs::remove_file(&meta_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        fs::write(self.data_path(name), payload)?;
        fs::write(&meta_path, meta)?;
        debug!("Cached {} in {}", name, self.dir.display());
        Ok(())
    }

    fn read_entry(
        &self,
        name: &str,
        set: &SourceDescriptor,
        now: DateTime<Utc>,
    ) -> Result<Option<Value>, DataError> {
        let meta_path = self.meta_path(name);
        let data_path = self.data_path(name);
        if !meta_path.exists() || !data_path.exists() {
            return Ok(None);
        }

        let meta = fs::read_to_string(&meta_path).map_err(|e| self.corrupt(name, e))?;
        let meta: CacheMeta = serde_json::from_str(&meta).map_err(|e| self.corrupt(name, e))?;

        // An entry without any ttl is treated as stale.
        let Some(ttl) = set.ttl.or(meta.options.ttl) else {
            return Ok(None);
        };
        let age = now.signed_duration_since(meta.created).num_milliseconds();
        if age >= i64::try_from(ttl).unwrap_or(i64::MAX) {
            debug!("Cache for {} expired ({}ms old, ttl {}ms)", name, age, ttl);
            return Ok(None);
        }

        let raw = fs::read_to_string(&data_path).map_err(|e| self.corrupt(name, e))?;
        let data = match meta.parser {
            CacheParser::String => Value::String(raw),
            CacheParser::Json => serde_json::from_str(&raw).map_err(|e| self.corrupt(name, e))?,
        };
        Ok(Some(data))
    }

    fn corrupt(&self, name: &str, err: impl ToString) -> DataError {
        DataError::Cache {
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}

/// File stem for an entry name.
///
/// ASCII alphanumerics and `-_.` are kept; every other byte, `%` included,
/// is percent-encoded, so distinct names never share a stem and no stem
/// contains a path separator.
pub fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => stem.push(byte as char),
            other => stem.push_str(&format!("%{:02X}", other)),
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn descriptor(ttl: u64) -> SourceDescriptor {
        SourceDescriptor {
            ttl: Some(ttl),
            ..SourceDescriptor::new("https://example.test/data.json")
        }
    }

    #[test]
    fn test_round_trip_json() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);
        let data = json!({"rows": [1, 2, 3], "title": "Times"});

        cache.set("times", &data, &set).unwrap();
        assert_eq!(cache.get("times", &set), Some(data));

        let meta = fs::read_to_string(cache.meta_path("times")).unwrap();
        assert!(meta.contains("\"parser\":\"json\""));
    }

    #[test]
    fn test_round_trip_string() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);
        let data = json!("<html>raw</html>");

        cache.set("page", &data, &set).unwrap();
        assert_eq!(
            fs::read_to_string(cache.data_path("page")).unwrap(),
            "<html>raw</html>"
        );
        assert_eq!(cache.get("page", &set), Some(data));
    }

    #[test]
    fn test_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(1_000);
        let now = Utc::now();

        let stale = now - Duration::milliseconds(1_001);
        cache.set_at("a", &json!({"y": 1}), &set, stale).unwrap();
        assert_eq!(cache.get_at("a", &set, now), None);

        cache.set_at("a", &json!({"y": 2}), &set, now).unwrap();
        assert_eq!(cache.get_at("a", &set, now), Some(json!({"y": 2})));
    }

    #[test]
    fn test_descriptor_ttl_overrides_meta() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let now = Utc::now();
        let created = now - Duration::milliseconds(5_000);

        cache.set_at("a", &json!(1), &descriptor(60_000), created).unwrap();
        assert_eq!(cache.get_at("a", &descriptor(1_000), now), None);

        let no_ttl = SourceDescriptor::new("https://example.test/data.json");
        assert_eq!(cache.get_at("a", &no_ttl, now), Some(json!(1)));
    }

    #[test]
    fn test_missing_files_are_misses() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);

        assert_eq!(cache.get("nothing", &set), None);

        cache.set("half", &json!(1), &set).unwrap();
        fs::remove_file(cache.data_path("half")).unwrap();
        assert_eq!(cache.get("half", &set), None);
    }

    #[test]
    fn test_corrupt_meta_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);

        cache.set("bad", &json!({"a": 1}), &set).unwrap();
        fs::write(cache.meta_path("bad"), "{ not json").unwrap();
        assert_eq!(cache.get("bad", &set), None);

        cache.set("bad", &json!({"a": 1}), &set).unwrap();
        fs::write(cache.data_path("bad"), "{ truncated").unwrap();
        assert_eq!(cache.get("bad", &set), None);
    }

    #[test]
    fn test_file_stem_encodes_paths() {
        assert_eq!(file_stem("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(file_stem("response-times"), "response-times");
        assert_eq!(file_stem("x y"), "x%20y");
        assert_eq!(file_stem("100%"), "100%25");
        assert_eq!(file_stem("café"), "caf%C3%A9");
    }

    #[test]
    fn test_similar_names_do_not_share_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);

        cache.set("x_y", &json!({"who": "x_y"}), &set).unwrap();
        assert_eq!(cache.get("x y", &set), None);
        assert_eq!(cache.get("x/y", &set), None);

        cache.set("x y", &json!({"who": "x y"}), &set).unwrap();
        assert_eq!(cache.get("x_y", &set), Some(json!({"who": "x_y"})));
        assert_eq!(cache.get("x y", &set), Some(json!({"who": "x y"})));
        assert_ne!(cache.meta_path("x y"), cache.meta_path("x_y"));
    }

    #[test]
    fn test_failed_data_write_leaves_no_meta() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path()).unwrap();
        let set = descriptor(60_000);

        cache.set("a", &json!({"y": 1}), &set).unwrap();
        fs::remove_file(cache.data_path("a")).unwrap();
        fs::create_dir(cache.data_path("a")).unwrap();

        assert!(cache.set("a", &json!({"y": 2}), &set).is_err());
        assert!(!cache.meta_path("a").exists());
        assert_eq!(cache.get("a", &set), None);
    }
}
