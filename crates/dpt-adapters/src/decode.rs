//! Content-type-aware payload decoding into rows of named fields.

use dpt_core::{RawRecord, Table};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Keys searched, in order, for the record sequence inside a JSON object payload.
pub const WRAPPER_KEYS: [&str; 4] = ["data", "results", "features", "items"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimited cells read as missing, matched exactly and case-sensitively.
pub const MISSING_CELL_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed delimited payload: {0}")]
    Delimited(#[from] csv::Error),
    #[error("delimited payload has no header row")]
    MissingHeader,
    #[error("data row {row} has {found} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unsupported JSON shape: {0}")]
    UnsupportedShape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Delimited,
}

impl PayloadFormat {
    /// Anything declaring `json` is structured; everything else is read as delimited text.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("json") {
            PayloadFormat::Json
        } else {
            PayloadFormat::Delimited
        }
    }
}

pub fn decode_payload(body: &[u8], content_type: &str) -> Result<Table, DecodeError> {
    match PayloadFormat::from_content_type(content_type) {
        PayloadFormat::Json => decode_json(body),
        PayloadFormat::Delimited => decode_delimited(body),
    }
}

/// User uploads: `.json` files are structured, anything else is comma-separated.
pub fn decode_upload(file_name: &str, body: &[u8]) -> Result<Table, DecodeError> {
    let content_type = if file_name.to_ascii_lowercase().ends_with(".json") {
        "application/json"
    } else {
        "text/csv"
    };
    decode_payload(body, content_type)
}

pub fn decode_json(body: &[u8]) -> Result<Table, DecodeError> {
    let mut payload: JsonValue = serde_json::from_slice(strip_bom(body))?;

    if let JsonValue::Object(map) = &mut payload {
        if let Some(key) = WRAPPER_KEYS.iter().find(|k| map.contains_key(**k)) {
            payload = map.remove(*key).unwrap_or(JsonValue::Null);
        }
    }

    let records = match payload {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::Object(map) => Ok(flatten_record(map)),
                other => Err(DecodeError::UnsupportedShape(format!(
                    "record {idx} is {}, expected an object",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        JsonValue::Object(map) => vec![flatten_record(map)],
        other => {
            return Err(DecodeError::UnsupportedShape(format!(
                "top-level {} cannot hold records",
                json_kind(&other)
            )))
        }
    };

    Ok(Table::from_records(records))
}

pub fn decode_delimited(body: &[u8]) -> Result<Table, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(strip_bom(body));

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(DecodeError::MissingHeader);
    }
    let columns = dedupe_headers(headers.iter());
    let mut table = Table::new(columns.clone());

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > columns.len() {
            return Err(DecodeError::RaggedRow {
                row: idx + 1,
                expected: columns.len(),
                found: record.len(),
            });
        }
        let row: RawRecord = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = match record.get(i) {
                    Some(cell) if !is_missing_cell(cell) => JsonValue::String(cell.to_string()),
                    _ => JsonValue::Null,
                };
                (column.clone(), value)
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

fn is_missing_cell(cell: &str) -> bool {
    cell.is_empty() || MISSING_CELL_TOKENS.contains(&cell)
}

fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(UTF8_BOM).unwrap_or(body)
}

/// Nested objects become dotted column names; arrays and scalars are kept as values.
fn flatten_record(map: serde_json::Map<String, JsonValue>) -> RawRecord {
    let mut out = RawRecord::new();
    for (key, value) in map {
        flatten_into(key, value, &mut out);
    }
    out
}

fn flatten_into(key: String, value: JsonValue, out: &mut RawRecord) {
    match value {
        JsonValue::Object(inner) if !inner.is_empty() => {
            for (child, child_value) in inner {
                flatten_into(format!("{key}.{child}"), child_value, out);
            }
        }
        other => {
            out.insert(key, other);
        }
    }
}

fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut n = 0;
        while out.contains(&name) {
            n += 1;
            name = format!("{header}.{n}");
        }
        out.push(name);
    }
    out
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
