//! Google Sheets source.
//!
//! Sheets come back as an array of row objects keyed by the header row.
//! With `keyColumn` set, rows are folded into a single key/value object
//! using the `Value` and `Type` columns.

use super::google_docs::published_contents;
use super::{send_json, Credentials, RemoteSettings, RemoteSource};
use crate::error::DataError;
use crate::formats;
use crate::models::{SheetRef, SourceDescriptor};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tracing::debug;

const VALUE_COLUMN: &str = "Value";
const TYPE_COLUMN: &str = "Type";

pub struct GoogleSheetsSource {
    client: Client,
    sheets_api_base: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    #[serde(default)]
    properties: SheetProperties,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    user_entered_value: Option<ExtendedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    string_value: Option<String>,
    number_value: Option<f64>,
    bool_value: Option<bool>,
    formula_value: Option<String>,
}

impl ExtendedValue {
    fn text(&self) -> Option<String> {
        if let Some(s) = &self.string_value {
            return Some(s.clone());
        }
        if let Some(n) = self.number_value {
            return Some(if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", n as i64)
            } else {
                n.to_string()
            });
        }
        if let Some(b) = self.bool_value {
            return Some(b.to_string());
        }
        self.formula_value.clone()
    }
}

type Grid = Vec<Vec<Option<String>>>;

impl GoogleSheetsSource {
    pub fn new(client: Client, settings: &RemoteSettings) -> Self {
        Self {
            client,
            sheets_api_base: settings.google_sheets_api_base.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
        }
    }

    async fn published_rows(&self, url: &str) -> Result<Value, DataError> {
        let body = published_contents(&self.client, url).await?;
        formats::parse_delimited(&body, b',').map_err(|e| DataError::parse("csv", e))
    }

    async fn raw_grid(&self, id: &str, sheet: Option<&SheetRef>) -> Result<Grid, DataError> {
        let token = self.credentials.google_access_token()?;
        let url = format!("{}/v4/spreadsheets/{}", self.sheets_api_base, id);
        debug!("Fetching spreadsheet grid {}", id);

        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("includeGridData", "true")]);
        let spreadsheet: Spreadsheet = send_json(request, &url).await?;

        let selected = match sheet {
            None => spreadsheet.sheets.first(),
            Some(SheetRef::Id(id)) => spreadsheet
                .sheets
                .iter()
                .find(|s| s.properties.sheet_id == *id),
            Some(SheetRef::Title(title)) => spreadsheet
                .sheets
                .iter()
                .find(|s| s.properties.title == *title),
        };
        let selected = selected.ok_or_else(|| {
            DataError::Config(format!("unable to locate sheet {:?} in {}", sheet, id))
        })?;

        Ok(selected
            .data
            .first()
            .map(|grid| {
                grid.row_data
                    .iter()
                    .map(|row| {
                        row.values
                            .iter()
                            .map(|cell| cell.user_entered_value.as_ref().and_then(ExtendedValue::text))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl RemoteSource for GoogleSheetsSource {
    async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError> {
        let id = set.require_source()?;

        let rows = if set.no_auth() {
            self.published_rows(id).await?
        } else {
            format_raw_grid(self.raw_grid(id, set.sheet.as_ref()).await?)
        };

        match &set.key_column {
            Some(column) => format_key_values(&rows, column),
            None => Ok(rows),
        }
    }
}

/// Turn a cell grid into row objects using the first row as headers.
fn format_raw_grid(mut grid: Grid) -> Value {
    if grid.is_empty() {
        return Value::Array(Vec::new());
    }

    let headers: Vec<String> = grid
        .remove(0)
        .into_iter()
        .map(|h| h.unwrap_or_default())
        .collect();

    let rows = grid
        .into_iter()
        .map(|row| {
            let fields: Map<String, Value> = row
                .into_iter()
                .zip(headers.iter())
                .map(|(cell, header)| {
                    let cell = match cell {
                        Some(text) => Value::String(text.trim().to_string()),
                        None => Value::Null,
                    };
                    (header.clone(), cell)
                })
                .collect();
            Value::Object(fields)
        })
        .collect();

    Value::Array(rows)
}

/// Fold rows into a key/value object with typed coercion.
fn format_key_values(rows: &Value, key_column: &str) -> Result<Value, DataError> {
    let rows = rows
        .as_array()
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| DataError::parse("google-sheets", "sheet has no rows to read keys from"))?;

    let mut content = Map::new();
    for row in rows {
        let key = match row.get(key_column).and_then(Value::as_str) {
            Some(key) => camel_case(key),
            None => continue,
        };
        if key.is_empty() {
            continue;
        }

        let value = row.get(VALUE_COLUMN).cloned().unwrap_or(Value::Null);
        let kind = row
            .get(TYPE_COLUMN)
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .unwrap_or_default();

        content.insert(key, coerce(value, &kind));
    }

    Ok(Value::Object(content))
}

fn coerce(value: Value, kind: &str) -> Value {
    let text = match value.as_str() {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return value,
    };

    match kind {
        "number" => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "boolean" => parse_boolean(&text),
        "array" => Value::Array(text.split('|').map(|s| Value::String(s.to_string())).collect()),
        // Dates are passed through untouched.
        _ => value,
    }
}

fn parse_boolean(text: &str) -> Value {
    let lower = text.trim().to_lowercase();
    if lower.contains("yes") || lower.contains("true") || lower.contains('1') || lower.starts_with('y') {
        Value::Bool(true)
    } else if lower.contains("no") || lower.contains("false") || lower.contains('0') || lower.starts_with('n') {
        Value::Bool(false)
    } else {
        Value::Null
    }
}

/// `"Social Description"` becomes `"socialDescription"`.
fn camel_case(key: &str) -> String {
    key.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i == 0 {
                lower
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect()
}
