//! Generic HTTP source.
//!
//! Descriptor options understood here:
//! - `headers`: map of request headers
//! - `query`: map of query parameters
//! - `timeoutSeconds`: per-request timeout

use super::{send_text, RemoteSource};
use crate::error::DataError;
use crate::formats;
use crate::models::{SourceDescriptor, SourceType};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError> {
        let url = set.require_source()?;
        debug!("GET {}", url);

        let mut request = self.client.get(url);

        if let Some(Value::Object(headers)) = set.options.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        if let Some(Value::Object(query)) = set.options.get("query") {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect();
            request = request.query(&pairs);
        }

        if let Some(seconds) = set.options.get("timeoutSeconds").and_then(Value::as_u64) {
            request = request.timeout(Duration::from_secs(seconds));
        }

        let body = send_text(request, url, 400).await?;
        decode_body(set.kind(), &body)
    }
}

/// Decode a response body according to the declared type.
///
/// Types without a dedicated codec are tried as JSON and fall back to
/// the raw text.
pub fn decode_body(format: SourceType, body: &str) -> Result<Value, DataError> {
    match format {
        SourceType::Json
        | SourceType::Csv
        | SourceType::Tsv
        | SourceType::Psv
        | SourceType::Yaml
        | SourceType::Aml => formats::parse_text(format, body),
        _ => Ok(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_strict() {
        assert_eq!(
            decode_body(SourceType::Json, r#"{"y": 2}"#).unwrap(),
            json!({"y": 2})
        );
        assert!(matches!(
            decode_body(SourceType::Json, "oops"),
            Err(DataError::Parse { .. })
        ));
    }

    #[test]
    fn test_decode_csv() {
        assert_eq!(
            decode_body(SourceType::Csv, "a,b\n1,2\n").unwrap(),
            json!([{"a": "1", "b": "2"}])
        );
    }

    #[test]
    fn test_decode_unknown_falls_back_to_text() {
        assert_eq!(
            decode_body(SourceType::Unknown, "[1, 2]").unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            decode_body(SourceType::Unknown, "<p>hi</p>").unwrap(),
            json!("<p>hi</p>")
        );
        assert_eq!(
            decode_body(SourceType::Geojson, r#"{"type": "Feature"}"#).unwrap(),
            json!({"type": "Feature"})
        );
    }
}
