//! Flattening JSON blobs into text records.

use super::ExtractionError;
use serde_json::Value;

/// Parse a JSON blob and flatten it into one text block per record.
///
/// A top-level array yields one record per element; any other value is a single record. Each
/// record becomes `path: value` lines with object keys in sorted order. Records without any
/// scalar value flatten to an empty string and keep their position.
pub fn flatten_records(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    Ok(records.iter().map(flatten_record).collect())
}

fn flatten_record(record: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into("", record, &mut lines);
    lines.join("\n")
}

fn flatten_into(path: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            for (key, child) in entries {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                flatten_into(&child_path, child, lines);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(&format!("{path}[{index}]"), child, lines);
            }
        }
        Value::Null => {}
        Value::String(text) => push_line(path, text.trim(), lines),
        Value::Bool(flag) => push_line(path, &flag.to_string(), lines),
        Value::Number(number) => push_line(path, &number.to_string(), lines),
    }
}

fn push_line(path: &str, text: &str, lines: &mut Vec<String>) {
    if text.is_empty() {
        return;
    }
    if path.is_empty() {
        lines.push(text.to_string());
    } else {
        lines.push(format!("{path}: {text}"));
    }
}
