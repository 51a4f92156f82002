//! HTML element and attribute serialization.

use serde_json::Value;

use crate::expression::ExpressionEngine;
use crate::value::{is_numeric, is_truthy, merge, to_text, Params};

const SELF_CLOSING: [&str; 16] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

/// Whether an element never gets a closing tag or contents.
pub fn is_self_closing(name: &str) -> bool {
    SELF_CLOSING.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

/// Render a full element.
///
/// `contents` of `None`, or a self-closing element name, yields only the
/// opening tag.
pub fn tag<'a, I>(
    engine: &ExpressionEngine,
    name: &str,
    attrs: I,
    contents: Option<&str>,
    params: &Params,
) -> String
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let attrs = attributes(engine, attrs, params);
    match contents {
        Some(contents) if !is_self_closing(name) => {
            format!("<{name}{attrs}>{contents}</{name}>")
        }
        _ => format!("<{name}{attrs}>"),
    }
}

/// Closing tag for an element, empty for self-closing names.
pub fn end(name: &str) -> String {
    if is_self_closing(name) {
        String::new()
    } else {
        format!("</{}>", name)
    }
}

/// Serialize attributes to ` key="value" key2` form (leading space included).
///
/// `true` renders the bare name; `false`, `null` and empty non-numeric values
/// are omitted; list or map values are evaluated as expressions first.
pub fn attributes<'a, I>(engine: &ExpressionEngine, attrs: I, params: &Params) -> String
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut output = Vec::new();

    for (key, value) in attrs {
        let value = match value {
            Value::Array(_) | Value::Object(_) => match expr(engine, value, params) {
                Some(text) => Value::String(text),
                None => continue,
            },
            other => other.clone(),
        };

        if !is_truthy(&value) && !is_numeric(&value) {
            continue;
        }

        match value {
            Value::Bool(true) => output.push(key.clone()),
            other => output.push(format!("{}=\"{}\"", key, escape(&to_text(&other)))),
        }
    }

    if output.is_empty() {
        String::new()
    } else {
        format!(" {}", output.join(" "))
    }
}

/// Evaluate a list- or map-valued attribute.
///
/// List items are expressions (non-string items are used as text). Map entries
/// are `expression => condition`: a falsy condition skips the entry, a map
/// condition is merged over the params for that expression. Non-empty results
/// are space-joined; `None` when nothing remains.
pub fn expr(engine: &ExpressionEngine, value: &Value, params: &Params) -> Option<String> {
    let mut output = Vec::new();

    let mut push = |text: String| {
        if !text.is_empty() {
            output.push(text);
        }
    };

    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(source) => push(engine.evaluate(source, params)),
                    Value::Object(_) => {
                        if let Some(text) = expr(engine, item, params) {
                            push(text);
                        }
                    }
                    other => push(to_text(other)),
                }
            }
        }
        Value::Object(map) => {
            for (source, condition) in map {
                if !is_truthy(condition) {
                    continue;
                }
                match condition {
                    Value::Object(extra) => push(engine.evaluate(source, &merge(params, extra))),
                    _ => push(engine.evaluate(source, params)),
                }
            }
        }
        Value::String(source) => push(engine.evaluate(source, params)),
        other => push(to_text(other)),
    }

    if output.is_empty() {
        None
    } else {
        Some(output.join(" "))
    }
}

/// Escape `& < > "`, leaving existing entities untouched.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if starts_entity(&text[i..]) => escaped.push('&'),
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn starts_entity(rest: &str) -> bool {
    let body = &rest[1..];
    let Some(end) = body.find(';') else {
        return false;
    };
    let name = &body[..end];
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(dec) = name.strip_prefix('#') {
        return !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit());
    }
    !name.is_empty()
        && name.len() <= 32
        && name.chars().all(|c| c.is_ascii_alphanumeric())
        && name.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
}
