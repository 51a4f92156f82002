//! Helpers for working with loosely-typed parameter values.
//!
//! Component parameters, layouts and field-sets are plain JSON values. The
//! functions here define how those values behave as conditions and as text.

use serde_json::{Map, Value};

/// Parameter map passed to components, layouts and expressions.
pub type Params = Map<String, Value>;

/// Truthiness of a value used as a condition.
///
/// `null`, `false`, `0`, `""`, `"0"` and empty containers are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Whether a value counts as "present" for an expression placeholder.
///
/// Any non-empty string holds (including `"0"`); other values fall back to
/// truthiness.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        other => is_truthy(other),
    }
}

/// Numeric values and numeric strings.
pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => {
            let s = s.trim_start();
            !s.is_empty()
                && s.bytes().any(|b| b.is_ascii_digit())
                && s.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b))
                && s.parse::<f64>().is_ok()
        }
        _ => false,
    }
}

/// Text form of a value as it is substituted into markup.
///
/// `true` becomes `"1"`, `false` and `null` become `""`, lists are joined by a
/// single space, maps have no text form.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => String::new(),
    }
}

/// Shallow merge: keys of `over` replace keys of `base`.
pub fn merge(base: &Params, over: &Params) -> Params {
    let mut merged = base.clone();
    for (key, value) in over {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Get a nested map entry, or an empty map when absent or not a map.
pub fn object_at(value: &Value, key: &str) -> Params {
    value
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Parse `key=value` pairs (CLI style) into params, reading values as JSON
/// when they parse and as plain strings otherwise.
pub fn parse_pairs<I, S>(pairs: I) -> Result<Params, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = Params::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", pair))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}
