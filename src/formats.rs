//! Text codecs shared by the local and remote resolvers.
//!
//! Delimited text is always read as an array of objects keyed by the
//! header row, with every cell kept as a string.

use crate::archieml;
use crate::error::DataError;
use crate::models::SourceType;
use serde_json::{Map, Value};

/// Field delimiter for the delimited formats.
pub fn delimiter_for(format: SourceType) -> Option<u8> {
    match format {
        SourceType::Csv => Some(b','),
        SourceType::Tsv => Some(b'\t'),
        SourceType::Psv => Some(b'|'),
        _ => None,
    }
}

/// Decode `text` as `format`. Formats without a codec return the raw text.
pub fn parse_text(format: SourceType, text: &str) -> Result<Value, DataError> {
    match format {
        SourceType::Json | SourceType::Geojson | SourceType::Topojson => {
            serde_json::from_str(text).map_err(|e| DataError::parse(format.as_str(), e))
        }
        SourceType::Csv | SourceType::Tsv | SourceType::Psv => {
            let delimiter = delimiter_for(format).unwrap_or(b',');
            parse_delimited(text, delimiter).map_err(|e| DataError::parse(format.as_str(), e))
        }
        SourceType::Yaml => {
            serde_yaml::from_str(text).map_err(|e| DataError::parse(format.as_str(), e))
        }
        SourceType::Aml => Ok(archieml::parse(text)),
        _ => Ok(Value::String(text.to_string())),
    }
}

/// Read delimited text into an array of row objects.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Value, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).unwrap_or("");
                (header.to_string(), Value::String(cell.to_string()))
            })
            .collect();
        rows.push(Value::Object(row));
    }

    Ok(Value::Array(rows))
}

/// Encode `data` for writing to disk as `format`.
pub fn write_value(format: SourceType, data: &Value) -> Result<String, DataError> {
    match format {
        SourceType::Json | SourceType::Geojson | SourceType::Topojson => {
            serde_json::to_string_pretty(data).map_err(|e| DataError::parse(format.as_str(), e))
        }
        SourceType::Csv | SourceType::Tsv | SourceType::Psv => {
            let delimiter = delimiter_for(format).unwrap_or(b',');
            write_delimited(data, delimiter).map_err(|e| DataError::parse(format.as_str(), e))
        }
        SourceType::Yaml => {
            serde_yaml::to_string(data).map_err(|e| DataError::parse(format.as_str(), e))
        }
        other => Err(DataError::parse(
            other.as_str(),
            "format cannot be written to disk",
        )),
    }
}

fn write_delimited(data: &Value, delimiter: u8) -> Result<String, String> {
    let rows = data
        .as_array()
        .ok_or_else(|| "expected an array of rows".to_string())?;

    // Union of keys, in first-seen order.
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        let fields = row
            .as_object()
            .ok_or_else(|| "expected every row to be an object".to_string())?;
        for key in fields.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&headers).map_err(|e| e.to_string())?;

    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|header| cell_text(row.get(header)))
            .collect();
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_csv_rows() {
        let data = parse_text(SourceType::Csv, "city,minutes\nMinneapolis,6\nSt. Paul,7\n").unwrap();
        assert_eq!(
            data,
            json!([
                {"city": "Minneapolis", "minutes": "6"},
                {"city": "St. Paul", "minutes": "7"}
            ])
        );
    }

    #[test]
    fn test_parse_short_rows_fill_blank() {
        let data = parse_delimited("a\tb\n1\n", b'\t').unwrap();
        assert_eq!(data, json!([{"a": "1", "b": ""}]));
    }

    #[test]
    fn test_parse_psv_and_yaml() {
        let data = parse_text(SourceType::Psv, "a|b\n1|2").unwrap();
        assert_eq!(data, json!([{"a": "1", "b": "2"}]));

        let data = parse_text(SourceType::Yaml, "title: Map\nzoom: 9\n").unwrap();
        assert_eq!(data, json!({"title": "Map", "zoom": 9}));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_text(SourceType::Json, "{not json").unwrap_err();
        assert!(matches!(err, DataError::Parse { ref format, .. } if format == "json"));
    }

    #[test]
    fn test_unknown_is_raw_text() {
        let data = parse_text(SourceType::Unknown, "plain").unwrap();
        assert_eq!(data, json!("plain"));
    }

    #[test]
    fn test_write_csv_header_union() {
        let data = json!([
            {"a": "1", "b": 2},
            {"a": "3", "c": null, "d": true}
        ]);
        let text = write_value(SourceType::Csv, &data).unwrap();
        assert_eq!(text, "a,b,c,d\n1,2,,\n3,,,true\n");
    }

    #[test]
    fn test_write_csv_rejects_non_rows() {
        assert!(write_value(SourceType::Csv, &json!({"a": 1})).is_err());
    }

    #[test]
    fn test_write_json_pretty() {
        let text = write_value(SourceType::Geojson, &json!({"type": "FeatureCollection"})).unwrap();
        assert!(text.contains("\n"));
        assert!(text.contains("\"FeatureCollection\""));
    }
}
