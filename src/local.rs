//! Local dataset resolution.

use crate::error::DataError;
use crate::formats;
use crate::models::{SourceDescriptor, SourceType};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a non-remote dataset from disk.
///
/// An explicit readable `type` wins; otherwise the format comes from the
/// file extension. Files with no recognised format are returned as text.
pub fn read_local(set: &SourceDescriptor, base_dir: Option<&Path>) -> Result<Value, DataError> {
    let source = set.require_source()?;
    let path = resolve_path(source, base_dir);
    let format = local_format(set.kind(), &path);

    debug!("Reading local {} as {}", path.display(), format);

    let text = fs::read_to_string(&path).map_err(|e| DataError::read(&path, e))?;

    if let Some(delimiter) = delimiter_override(set) {
        if formats::delimiter_for(format).is_some() {
            return formats::parse_delimited(&text, delimiter)
                .map_err(|e| DataError::read(&path, e));
        }
    }

    formats::parse_text(format, &text).map_err(|e| DataError::read(&path, e))
}

fn resolve_path(source: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(source);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn local_format(declared: SourceType, path: &Path) -> SourceType {
    if has_reader(declared) {
        return declared;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceType::from_extension)
        .unwrap_or(SourceType::Unknown)
}

fn has_reader(format: SourceType) -> bool {
    format.is_writable() || format == SourceType::Aml
}

/// `options.delimiter`, when it is a single byte.
fn delimiter_override(set: &SourceDescriptor) -> Option<u8> {
    let delimiter = set.options.get("delimiter")?.as_str()?;
    match delimiter.as_bytes() {
        [byte] => Some(*byte),
        _ => None,
    }
}
