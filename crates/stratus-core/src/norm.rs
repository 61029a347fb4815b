//! Value normalization shared by diffing and fact gathering.
//!
//! ARM responses mix representations: durations as ISO 8601 strings,
//! capacities as decimal strings, property keys in camelCase. Everything
//! here converges on one shape — whole minutes, integers, snake_case —
//! so that a desired state and a remote state can be compared textually.

use std::collections::BTreeMap;

use jiff::{Span, Unit};
use serde_json::{Map, Value};

/// Parse an ISO 8601 duration (`PT5M`, `PT1H`) into whole-ish minutes.
///
/// Returns `None` when the value does not parse or does not convert to a
/// minute total — callers treat that as drift (fail open toward update).
pub fn duration_minutes(value: &str) -> Option<f64> {
    let span: Span = value.parse().ok()?;
    span.total(Unit::Minute).ok()
}

/// Render whole minutes as the ISO 8601 duration ARM expects.
pub fn minutes_to_iso(minutes: i64) -> String {
    format!("PT{minutes}M")
}

/// Normalize a duration-or-minutes JSON value to a minute count.
///
/// Accepts an ISO 8601 string or a bare number (already in minutes).
pub fn minutes_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => duration_minutes(s),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Minute count as a JSON number, integral when whole so that `1` and
/// `1.0` normalize to the same representation.
pub fn minutes_json(minutes: f64) -> Value {
    if minutes.fract() == 0.0 && minutes.abs() < i64::MAX as f64 {
        Value::from(minutes as i64)
    } else {
        Value::from(minutes)
    }
}

/// Duration-or-minutes JSON value → normalized minute count. Values that
/// cannot be read as a duration pass through unchanged, so they compare
/// unequal and the caller fails open toward "changed".
pub fn minutes_norm(value: &Value) -> Value {
    match minutes_value(value) {
        Some(m) => minutes_json(m),
        None => value.clone(),
    }
}

/// Any JSON number as f64, so integer and float spellings of the same
/// quantity (70 vs 70.0) compare equal. Non-numbers pass through.
pub fn float_value(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) => Value::from(f),
        None => value.clone(),
    }
}

/// Parse an integer that may arrive as a decimal string — ARM renders
/// scale capacities as `"2"`. Unparseable values pass through.
pub fn int_value(value: &Value) -> Value {
    match value {
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Canonical string form of a JSON value: object keys sorted, no
/// whitespace. Equal canonical strings mean structurally equal values.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let fields: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, canonical_string(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_string).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}

/// Compare two lists as unordered multisets of canonical strings.
///
/// Order differences never count as a change; content differences always
/// do.
pub fn unordered_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<String> = a.iter().map(canonical_string).collect();
    let mut right: Vec<String> = b.iter().map(canonical_string).collect();
    left.sort();
    right.sort();
    left == right
}

/// Sort a JSON array in place by canonical string, so that nested lists
/// embedded in a larger structure compare order-independently.
pub fn sort_by_canonical(items: &mut [Value]) {
    items.sort_by_key(canonical_string);
}

/// Overlay desired tags on the current remote tags.
///
/// Returns whether any desired key is missing or differs remotely, plus
/// the merged tag map for the update payload. Remote-only keys survive
/// the merge.
pub fn merge_tags(
    current: Option<&Map<String, Value>>,
    desired: Option<&BTreeMap<String, String>>,
) -> (bool, Map<String, Value>) {
    let mut merged = current.cloned().unwrap_or_default();
    let Some(desired) = desired else {
        return (false, merged);
    };

    let mut changed = false;
    for (key, value) in desired {
        let matches = merged
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|v| v == value);
        if !matches {
            changed = true;
        }
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    (changed, merged)
}

/// camelCase / PascalCase → snake_case.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Flatten an ARM resource body into one level: every top-level field
/// (envelope fields like `id`/`name`/`location`, but also the bare
/// fields some collections return, e.g. a metric's `unit`) plus the
/// contents of `properties`, with keys converted to snake_case.
pub fn flatten_resource(remote: &Value) -> Value {
    let mut flat = Map::new();

    if let Some(obj) = remote.as_object() {
        for (key, v) in obj {
            if key != "properties" {
                flat.insert(camel_to_snake(key), v.clone());
            }
        }
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (key, v) in props {
                flat.insert(camel_to_snake(key), v.clone());
            }
        }
    }

    Value::Object(flat)
}
