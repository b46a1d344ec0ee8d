//! Writing resolved datasets to a local output directory.

use crate::cache::file_stem;
use crate::error::DataError;
use crate::formats;
use crate::models::{SourceDescriptor, SourceType};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Write `data` for entry `name` if the descriptor asks for a local copy.
///
/// Returns the written path, or `None` when nothing was written. A missing
/// output directory is logged and skipped.
pub fn save_local(
    data: &Value,
    set: &SourceDescriptor,
    name: &str,
    output_dir: Option<&Path>,
) -> Result<Option<PathBuf>, DataError> {
    if !set.wants_local() {
        return Ok(None);
    }

    let Some(output_dir) = output_dir else {
        warn!(
            "local is set for {}, but the local output directory is not set; cannot save.",
            name
        );
        return Ok(None);
    };

    let file_name = local_file_name(set, name);
    check_relative(&file_name)?;
    let path = output_dir.join(&file_name);
    let format = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceType::from_extension)
        .filter(SourceType::is_writable)
        .unwrap_or(SourceType::Json);

    info!("Saving local version of {} as {}", name, path.display());

    let content = formats::write_value(format, data)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(Some(path))
}

/// The descriptor's explicit file name, or `<name>.<extension>` with the
/// name encoded the same way as cache entries.
pub fn local_file_name(set: &SourceDescriptor, name: &str) -> String {
    if let Some(file) = set.local.as_ref().and_then(|l| l.file_name()) {
        return file.to_string();
    }
    format!("{}.{}", file_stem(name), local_extension(set))
}

/// Explicit file names may nest below the output directory but never leave it.
fn check_relative(file_name: &str) -> Result<(), DataError> {
    let escapes = Path::new(file_name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(DataError::Config(format!(
            "local file name must stay inside the local output directory: {}",
            file_name
        )));
    }
    Ok(())
}

fn local_extension(set: &SourceDescriptor) -> &'static str {
    let declared = set.kind();
    if declared.is_writable() {
        return declared.as_str();
    }

    set.source
        .as_deref()
        .and_then(|s| s.rsplit_once('.'))
        .and_then(|(_, ext)| SourceType::from_extension(ext))
        .filter(SourceType::is_writable)
        .map(|t| t.as_str())
        .unwrap_or("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalTarget;
    use serde_json::json;
    use tempfile::TempDir;

    fn local(set: SourceDescriptor, target: LocalTarget) -> SourceDescriptor {
        SourceDescriptor {
            local: Some(target),
            ..set
        }
    }

    #[test]
    fn test_file_name_from_type() {
        let set = local(
            SourceDescriptor::new("https://example.test/x?format=csv").with_type(SourceType::Csv),
            LocalTarget::Enabled(true),
        );
        assert_eq!(local_file_name(&set, "stations"), "stations.csv");
    }

    #[test]
    fn test_file_name_from_extension() {
        let set = local(
            SourceDescriptor::new("assets/areas.geojson").with_type(SourceType::Unknown),
            LocalTarget::Enabled(true),
        );
        assert_eq!(local_file_name(&set, "areas"), "areas.geojson");
    }

    #[test]
    fn test_file_name_defaults_to_json() {
        let set = local(
            SourceDescriptor::new("https://docs.google.com/document/d/abc")
                .with_type(SourceType::GoogleDocs),
            LocalTarget::Enabled(true),
        );
        assert_eq!(local_file_name(&set, "content"), "content.json");

        let named = local(set, LocalTarget::File("story.json".to_string()));
        assert_eq!(local_file_name(&named, "content"), "story.json");
    }

    #[test]
    fn test_save_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let set = local(
            SourceDescriptor::new("rows.csv").with_type(SourceType::Csv),
            LocalTarget::Enabled(true),
        );
        let data = json!([{"a": "1"}, {"a": "2"}]);

        let path = save_local(&data, &set, "rows", Some(temp_dir.path()))
            .unwrap()
            .unwrap();
        assert_eq!(path, temp_dir.path().join("rows.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a\n1\n2\n");
    }

    #[test]
    fn test_file_name_encodes_entry_name() {
        let set = local(
            SourceDescriptor::new("a.json").with_type(SourceType::Json),
            LocalTarget::Enabled(true),
        );
        assert_eq!(local_file_name(&set, "../x"), "..%2Fx.json");
        assert_eq!(local_file_name(&set, "x y"), "x%20y.json");
    }

    #[test]
    fn test_save_stays_inside_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let data = json!({"a": 1});

        let by_name = local(
            SourceDescriptor::new("a.json").with_type(SourceType::Json),
            LocalTarget::Enabled(true),
        );
        let path = save_local(&data, &by_name, "../x", Some(&out))
            .unwrap()
            .unwrap();
        assert_eq!(path.parent(), Some(out.as_path()));
        assert!(!temp_dir.path().join("x.json").exists());

        let by_file = local(by_name, LocalTarget::File("../escape.json".to_string()));
        let err = save_local(&data, &by_file, "x", Some(&out)).unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
        assert!(!temp_dir.path().join("escape.json").exists());

        let nested = local(by_file, LocalTarget::File("sub/nested.json".to_string()));
        let path = save_local(&data, &nested, "x", Some(&out)).unwrap().unwrap();
        assert_eq!(path, out.join("sub/nested.json"));
    }

    #[test]
    fn test_save_skipped_without_flag_or_dir() {
        let temp_dir = TempDir::new().unwrap();
        let data = json!({"a": 1});

        let not_local = SourceDescriptor::new("a.json");
        assert!(save_local(&data, &not_local, "a", Some(temp_dir.path()))
            .unwrap()
            .is_none());

        let wants = local(SourceDescriptor::new("a.json"), LocalTarget::Enabled(true));
        assert!(save_local(&data, &wants, "a", None).unwrap().is_none());
    }
}
