//! Step-table coercion and JSON path lookup

use serde_json::{Map, Number, Value};

/// Coerces one table cell: integers, decimals and booleans become JSON
/// scalars; everything else stays a string.
pub fn coerce(raw: &str) -> Value {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<u64>() {
            return Value::Number(n.into());
        }
    }
    if is_decimal(raw) {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn is_decimal(raw: &str) -> bool {
    match raw.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Two-column `| key | value |` table into a coerced JSON object.
///
/// Rows that do not have exactly two cells are skipped.
pub fn rows_hash_coerced(rows: &[Vec<String>]) -> Map<String, Value> {
    rows.iter()
        .filter_map(|row| match row.as_slice() {
            [key, value] => Some((key.trim().to_string(), coerce(value.trim()))),
            _ => None,
        })
        .collect()
}

/// Walks `a.b.0.c` through objects (by key) and arrays (by index).
pub fn get_by_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |acc, key| match acc {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Renders a JSON value the way a step compares it: strings bare, the rest as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
