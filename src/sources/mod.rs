//! Remote data sources.
//!
//! Each remote [`SourceType`] maps to a [`RemoteSource`] implementation in a
//! [`SourceRegistry`]; types without a dedicated entry use the generic HTTP
//! source.

pub mod airtable;
pub mod google_docs;
pub mod google_sheets;
pub mod http;

use crate::error::DataError;
use crate::models::{SourceDescriptor, SourceType};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use airtable::AirtableSource;
pub use google_docs::GoogleDocsSource;
pub use google_sheets::GoogleSheetsSource;
pub use http::HttpSource;

pub const AIRTABLE_API_KEY_VAR: &str = "AIRTABLE_API_KEY";
pub const GOOGLE_ACCESS_TOKEN_VAR: &str = "GOOGLE_ACCESS_TOKEN";

/// Something that can turn a remote descriptor into data.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError>;
}

/// Connection settings shared by the remote sources.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub google_drive_api_base: String,
    pub google_sheets_api_base: String,
    pub airtable_api_base: String,
    pub airtable_page_size: u32,
    pub credentials: Credentials,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: format!("build-data/{}", env!("CARGO_PKG_VERSION")),
            google_drive_api_base: "https://www.googleapis.com".to_string(),
            google_sheets_api_base: "https://sheets.googleapis.com".to_string(),
            airtable_api_base: "https://api.airtable.com".to_string(),
            airtable_page_size: 100,
            credentials: Credentials::from_env(),
        }
    }
}

/// API credentials. Missing values are only an error for the sources
/// that need them.
#[derive(Clone, Default)]
pub struct Credentials {
    pub airtable_api_key: Option<String>,
    pub google_access_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("airtable_api_key", &self.airtable_api_key.as_ref().map(|_| "***"))
            .field("google_access_token", &self.google_access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            airtable_api_key: env_value(AIRTABLE_API_KEY_VAR),
            google_access_token: env_value(GOOGLE_ACCESS_TOKEN_VAR),
        }
    }

    pub(crate) fn airtable_api_key(&self) -> Result<&str, DataError> {
        self.airtable_api_key.as_deref().ok_or_else(|| {
            DataError::Config(format!(
                "Airtable API access requires a key in the {} environment variable",
                AIRTABLE_API_KEY_VAR
            ))
        })
    }

    pub(crate) fn google_access_token(&self) -> Result<&str, DataError> {
        self.google_access_token.as_deref().ok_or_else(|| {
            DataError::Config(format!(
                "Google API access requires a token in the {} environment variable \
                 (or set options.noAuth for published documents)",
                GOOGLE_ACCESS_TOKEN_VAR
            ))
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Type-keyed table of remote sources with a generic fallback.
pub struct SourceRegistry {
    sources: HashMap<SourceType, Arc<dyn RemoteSource>>,
    fallback: Arc<dyn RemoteSource>,
}

impl SourceRegistry {
    /// An empty registry that sends everything to `fallback`.
    pub fn new(fallback: Arc<dyn RemoteSource>) -> Self {
        Self {
            sources: HashMap::new(),
            fallback,
        }
    }

    /// The standard table: Google Docs, Google Sheets, Airtable, and HTTP.
    pub fn standard(settings: &RemoteSettings) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| DataError::Config(format!("failed to create HTTP client: {}", e)))?;

        let mut registry = Self::new(Arc::new(HttpSource::new(client.clone())));
        registry.register(
            SourceType::GoogleDocs,
            Arc::new(GoogleDocsSource::new(client.clone(), settings)),
        );
        registry.register(
            SourceType::GoogleSheets,
            Arc::new(GoogleSheetsSource::new(client.clone(), settings)),
        );
        registry.register(
            SourceType::Airtable,
            Arc::new(AirtableSource::new(client, settings)),
        );
        Ok(registry)
    }

    pub fn register(&mut self, source_type: SourceType, source: Arc<dyn RemoteSource>) {
        self.sources.insert(source_type, source);
    }

    pub fn resolver_for(&self, source_type: SourceType) -> &Arc<dyn RemoteSource> {
        self.sources.get(&source_type).unwrap_or(&self.fallback)
    }

    pub async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError> {
        self.resolver_for(set.kind()).fetch(set).await
    }
}

/// Send a request and return the body, failing on any status at or above
/// `max_status`.
pub(crate) async fn send_text(
    request: RequestBuilder,
    url: &str,
    max_status: u16,
) -> Result<String, DataError> {
    let response = request.send().await.map_err(|e| DataError::fetch(url, e))?;
    let status = response.status().as_u16();
    if status >= max_status {
        return Err(DataError::Status {
            url: url.to_string(),
            status,
        });
    }
    response.text().await.map_err(|e| DataError::fetch(url, e))
}

/// Send a request and decode a JSON body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
) -> Result<T, DataError> {
    let body = send_text(request, url, 400).await?;
    serde_json::from_str(&body).map_err(|e| DataError::parse("json", e))
}
