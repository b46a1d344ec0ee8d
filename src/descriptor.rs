//! Descriptor normalization.
//!
//! Turns shorthand strings and partial descriptors into complete
//! [`SourceDescriptor`]s. No I/O happens here.

use crate::error::DataError;
use crate::models::{DescriptorInput, SourceDescriptor, SourceType};
use serde_json::Value;

const GOOGLE_DOCS_PREFIX: &str = "https://docs.google.com/document";
const GOOGLE_SHEETS_PREFIX: &str = "https://docs.google.com/spreadsheets";

/// Default cache lifetime: ten minutes.
pub const DEFAULT_TTL_MS: u64 = 1000 * 60 * 10;

/// Expand a declaration into a complete descriptor.
///
/// After this call `remote`, `source_type` and `ttl` are always set.
pub fn parse_set(input: DescriptorInput, default_ttl: u64) -> Result<SourceDescriptor, DataError> {
    let mut set = match input {
        DescriptorInput::Shorthand(s) => expand_shorthand(s)?,
        DescriptorInput::Descriptor(d) => d,
    };

    if set.data.is_some() {
        return Ok(set);
    }

    if set.source.as_deref().map(str::is_empty).unwrap_or(true)
        && set.kind() != SourceType::Airtable
    {
        return Err(DataError::Config(
            "descriptor has no `source`, `url` or `id`".to_string(),
        ));
    }

    if set.remote.is_none() {
        let by_type = set.source_type.map(|t| t.is_remote_only()).unwrap_or(false);
        let by_scheme = set.source.as_deref().map(is_http).unwrap_or(false);
        set.remote = Some(by_type || by_scheme);
    }

    if set.source_type.is_none() {
        set.source_type = Some(determine_type(set.source.as_deref().unwrap_or("")));
    }

    if set.ttl.is_none() {
        set.ttl = Some(default_ttl);
    }

    Ok(set)
}

/// Best-effort type sniffing from a source string.
pub fn determine_type(source: &str) -> SourceType {
    let lower = source.to_lowercase();
    if lower.contains("csv") {
        SourceType::Csv
    } else if lower.contains("json") {
        SourceType::Json
    } else {
        SourceType::Unknown
    }
}

fn expand_shorthand(source: String) -> Result<SourceDescriptor, DataError> {
    if source.trim().is_empty() {
        return Err(DataError::Config(
            "shorthand descriptor must not be empty".to_string(),
        ));
    }

    let lower = source.to_lowercase();
    let published = if lower.starts_with(GOOGLE_DOCS_PREFIX) {
        Some(SourceType::GoogleDocs)
    } else if lower.starts_with(GOOGLE_SHEETS_PREFIX) {
        Some(SourceType::GoogleSheets)
    } else {
        None
    };

    Ok(match published {
        Some(source_type) => SourceDescriptor {
            remote: Some(true),
            ..SourceDescriptor::new(source)
                .with_type(source_type)
                .with_option("noAuth", Value::Bool(true))
        },
        None => SourceDescriptor::new(source),
    })
}

fn is_http(source: &str) -> bool {
    source
        .get(..4)
        .map(|scheme| scheme.eq_ignore_ascii_case("http"))
        .unwrap_or(false)
}
