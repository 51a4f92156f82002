//! Field-set shaping and the derived field cache.
//!
//! A field-set is a map of field name → field definition, optionally wrapped
//! as `{type: fieldset, children: {...}}`. Components reuse field-sets by
//! reshaping them: overwriting entries, dropping or keeping a subset, and
//! prefixing names.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ComponentError;
use crate::value::{merge, Params};

/// Field keys whose map values are translated per locale.
const LOCALIZED_KEYS: [&str; 4] = ["label", "description", "notes", "placeholder"];

/// Locale used when a translation is missing.
pub const DEFAULT_LOCALE: &str = "default";

/// Reshaping options for [`shape_fields`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub overwrite: Params,
}

impl FieldOptions {
    pub fn is_noop(&self) -> bool {
        self.prefix.is_empty()
            && self.exclude.is_empty()
            && self.include.is_empty()
            && self.overwrite.is_empty()
    }

    /// Stable identity of these options, used to name cache artifacts.
    pub fn identity(&self) -> String {
        let serialized = serde_json::to_vec(self).unwrap_or_default();
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &serialized).simple().to_string()[..12].to_string()
    }
}

/// Reshape a field-set.
///
/// Per entry, in order: apply `overwrite` (its `options` merged under the
/// entry's own options, the rest merged over the entry); drop `exclude`d
/// names; keep only `include`d names when `include` is non-empty; prepend
/// `prefix` to the surviving names. A wrapped field-set is reshaped inside its
/// `children` and returned wrapped.
pub fn shape_fields(fieldset: &Value, options: &FieldOptions) -> Value {
    if is_wrapped(fieldset) {
        let mut wrapped = fieldset.clone();
        let children = fieldset.get("children").cloned().unwrap_or(Value::Null);
        wrapped["children"] = Value::Object(shape_map(&children, options));
        return wrapped;
    }
    Value::Object(shape_map(fieldset, options))
}

fn is_wrapped(fieldset: &Value) -> bool {
    fieldset.get("type").and_then(Value::as_str) == Some("fieldset")
        && fieldset.get("children").map(Value::is_object).unwrap_or(false)
}

fn shape_map(fields: &Value, options: &FieldOptions) -> Params {
    let Some(fields) = fields.as_object() else {
        return Params::new();
    };

    let mut shaped = Params::new();
    for (name, field) in fields {
        let field = match options.overwrite.get(name) {
            Some(overwrite) => overwrite_field(field, overwrite),
            None => field.clone(),
        };
        if options.exclude.iter().any(|excluded| excluded == name) {
            continue;
        }
        if !options.include.is_empty() && !options.include.iter().any(|included| included == name) {
            continue;
        }
        shaped.insert(format!("{}{}", options.prefix, name), field);
    }
    shaped
}

fn overwrite_field(field: &Value, overwrite: &Value) -> Value {
    let (Some(original), Some(overwrite)) = (field.as_object(), overwrite.as_object()) else {
        return field.clone();
    };

    let options = match (overwrite.get("options"), original.get("options")) {
        (Some(Value::Object(extra)), Some(Value::Object(own))) => Some(Value::Object(merge(extra, own))),
        (Some(Value::Array(extra)), Some(Value::Array(own))) => {
            Some(Value::Array(extra.iter().chain(own.iter()).cloned().collect()))
        }
        (Some(extra), None) => Some(extra.clone()),
        (_, Some(own)) => Some(own.clone()),
        (None, None) => None,
    };

    let mut rest = overwrite.clone();
    rest.remove("options");
    let mut merged = merge(original, &rest);
    if let Some(options) = options {
        merged.insert("options".to_string(), options);
    }
    Value::Object(merged)
}

/// Replace translatable map values by their `locale` entry, falling back to
/// `default`, then the first entry.
pub fn localize(fieldset: &mut Value, locale: &str) {
    match fieldset {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if LOCALIZED_KEYS.contains(&key.as_str()) {
                    if let Some(translations) = value.as_object() {
                        let chosen = translations
                            .get(locale)
                            .or_else(|| translations.get(DEFAULT_LOCALE))
                            .or_else(|| translations.values().next())
                            .cloned()
                            .unwrap_or(Value::Null);
                        *value = chosen;
                        continue;
                    }
                }
                localize(value, locale);
            }
        }
        Value::Array(items) => {
            for item in items {
                localize(item, locale);
            }
        }
        _ => {}
    }
}

/// On-disk cache of resolved field-sets, one artifact per
/// (field-set, options, locale).
#[derive(Debug, Clone)]
pub struct FieldCache {
    dir: PathBuf,
}

impl FieldCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, key: &str, options: &FieldOptions, locale: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir
            .join(format!("{}-{}.{}.json", safe_key, options.identity(), locale))
    }

    /// Artifact contents when it exists and is at least as new as `modified`.
    pub fn fresh(&self, path: &Path, modified: i64) -> Option<Value> {
        let stamp = file_timestamp(path)?;
        if stamp < modified {
            tracing::debug!("Field cache {} is stale ({} < {})", path.display(), stamp, modified);
            return None;
        }
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn store(&self, path: &Path, value: &Value) -> Result<(), ComponentError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ComponentError::io(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(path, contents).map_err(|e| ComponentError::io(path, e))
    }
}

/// Modification time of a file in unix seconds.
pub fn file_timestamp(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fieldset() -> Value {
        json!({
            "title": {"type": "text", "label": "Title"},
            "style": {"type": "select", "options": {"default": "Default", "primary": "Primary"}},
            "size": {"type": "select", "options": ["small", "large"]}
        })
    }

    #[test]
    fn test_noop_options_are_idempotent() {
        let options = FieldOptions::default();
        assert!(options.is_noop());
        let once = shape_fields(&fieldset(), &options);
        assert_eq!(once, fieldset());
        assert_eq!(shape_fields(&once, &options), once);
    }

    #[test]
    fn test_overwrite_merges_options_under_original() {
        let options = FieldOptions {
            overwrite: json!({
                "style": {"label": "Style", "options": {"": "None", "primary": "Overridden"}},
                "size": {"options": ["xsmall"]}
            })
            .as_object()
            .cloned()
            .unwrap(),
            ..Default::default()
        };

        let shaped = shape_fields(&fieldset(), &options);
        assert_eq!(shaped["style"]["label"], json!("Style"));
        assert_eq!(
            shaped["style"]["options"],
            json!({"": "None", "primary": "Primary", "default": "Default"})
        );
        assert_eq!(shaped["size"]["options"], json!(["xsmall", "small", "large"]));
    }

    #[test]
    fn test_exclude_include_prefix_order() {
        let options = FieldOptions {
            prefix: "card_".to_string(),
            exclude: vec!["size".to_string()],
            include: vec!["title".to_string(), "size".to_string()],
            ..Default::default()
        };
        let shaped = shape_fields(&fieldset(), &options);
        let keys: Vec<&String> = shaped.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["card_title"]);
    }

    #[test]
    fn test_wrapped_fieldset() {
        let wrapped = json!({"type": "fieldset", "label": "Card", "children": fieldset()});
        let options = FieldOptions {
            include: vec!["title".to_string()],
            ..Default::default()
        };
        let shaped = shape_fields(&wrapped, &options);
        assert_eq!(shaped["type"], json!("fieldset"));
        assert_eq!(shaped["label"], json!("Card"));
        assert_eq!(shaped["children"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_localize() {
        let mut value = json!({
            "title": {"label": {"default": "Title", "de": "Titel"}, "notes": {"fr": "Note"}},
            "plain": {"label": "Plain"}
        });
        localize(&mut value, "de");
        assert_eq!(value["title"]["label"], json!("Titel"));
        assert_eq!(value["title"]["notes"], json!("Note"));
        assert_eq!(value["plain"]["label"], json!("Plain"));
    }

    #[test]
    fn test_field_cache_freshness() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FieldCache::new(temp_dir.path());
        let path = cache.artifact_path("card.basic", &FieldOptions::default(), "de");
        assert!(path.to_string_lossy().ends_with(".de.json"));

        assert!(cache.fresh(&path, 0).is_none());
        cache.store(&path, &json!({"a": 1})).unwrap();

        let stamp = file_timestamp(&path).unwrap();
        assert_eq!(cache.fresh(&path, stamp), Some(json!({"a": 1})));
        assert!(cache.fresh(&path, stamp + 10).is_none());
    }

    #[test]
    fn test_identity_depends_on_options() {
        let a = FieldOptions::default();
        let b = FieldOptions {
            prefix: "x_".to_string(),
            ..Default::default()
        };
        assert_eq!(a.identity(), FieldOptions::default().identity());
        assert_ne!(a.identity(), b.identity());
    }
}
