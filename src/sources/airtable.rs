//! Airtable source.
//!
//! Pages through every record of a table (optionally through a view) and
//! returns the records' fields, each tagged with its `airtableID`.

use super::{send_json, Credentials, RemoteSettings, RemoteSource};
use crate::error::DataError;
use crate::models::SourceDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub struct AirtableSource {
    client: Client,
    api_base: String,
    page_size: u32,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl AirtableSource {
    pub fn new(client: Client, settings: &RemoteSettings) -> Self {
        Self {
            client,
            api_base: settings.airtable_api_base.trim_end_matches('/').to_string(),
            page_size: settings.airtable_page_size.clamp(1, 100),
            credentials: settings.credentials.clone(),
        }
    }
}

#[async_trait]
impl RemoteSource for AirtableSource {
    async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError> {
        let base = set
            .base
            .as_deref()
            .or(set.source.as_deref())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                DataError::Config(
                    "the Airtable base id is needed; find it in the Airtable API docs".to_string(),
                )
            })?;
        let table = set
            .table
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataError::Config("the Airtable table name is needed".to_string()))?;
        let key = self.credentials.airtable_api_key()?;

        let url = format!("{}/v0/{}/{}", self.api_base, base, table);
        let mut rows = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", self.page_size.to_string())];
            if let Some(view) = &set.view {
                query.push(("view", view.clone()));
            }
            if let Some(offset) = &offset {
                query.push(("offset", offset.clone()));
            }

            let request = self.client.get(&url).bearer_auth(key).query(&query);
            let page: Page = send_json(request, &url).await?;
            debug!("Airtable {}/{}: {} records", base, table, page.records.len());

            rows.extend(page.records.into_iter().filter_map(flatten_record));

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(Value::Array(rows))
    }
}

/// A record's fields plus its id; records without fields are dropped.
fn flatten_record(record: Record) -> Option<Value> {
    if record.fields.is_empty() {
        return None;
    }
    let mut fields = record.fields;
    fields.insert("airtableID".to_string(), Value::String(record.id));
    Some(Value::Object(fields))
}
