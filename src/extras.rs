//! Extras store: named partial resources (layouts, template fragments,
//! field-sets) owned by a component or by the shared group.
//!
//! Entries are registered under `"<owner>.<name>"` during discovery and parsed
//! on first load. Parsed entries are memoized for the life of the store.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lister::{pattern_in, DirectoryLister};
use crate::registry::read_data_file;
use crate::value::{object_at, Params};

/// Owner name of extras that belong to no single component.
pub const SHARED_OWNER: &str = "shared";

const DATA_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraGroup {
    Layouts,
    Templates,
    Fields,
}

impl ExtraGroup {
    pub const ALL: [ExtraGroup; 3] = [ExtraGroup::Layouts, ExtraGroup::Templates, ExtraGroup::Fields];

    /// Directory name of the group inside a component or root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ExtraGroup::Layouts => "layouts",
            ExtraGroup::Templates => "templates",
            ExtraGroup::Fields => "fields",
        }
    }

    fn is_data(&self) -> bool {
        !matches!(self, ExtraGroup::Templates)
    }
}

impl fmt::Display for ExtraGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Where an extra comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraSource {
    File(PathBuf),
    Inline(Value),
}

impl ExtraSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ExtraSource::File(path) => Some(path),
            ExtraSource::Inline(_) => None,
        }
    }
}

/// A loaded extra.
#[derive(Debug, Clone, PartialEq)]
pub struct Extra {
    pub key: String,
    pub source: ExtraSource,
    /// Parsed data; for template fragments, the file path as a string.
    pub data: Value,
}

/// Per-group index of extras with a parse-once cache.
#[derive(Debug, Default)]
pub struct ExtrasStore {
    entries: RwLock<HashMap<ExtraGroup, IndexMap<String, ExtraSource>>>,
    loaded: RwLock<HashMap<(ExtraGroup, String), Arc<Extra>>>,
}

impl ExtrasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `"<owner>.<name>"` in a group. Re-registering replaces the
    /// source and forgets any parsed value.
    pub fn register(&self, group: ExtraGroup, owner: &str, name: &str, source: ExtraSource) -> String {
        let key = format!("{}.{}", owner, name);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(group)
            .or_default()
            .insert(key.clone(), source);
        self.loaded
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(group, key.clone()));
        key
    }

    /// Register every extra found under `<directory>/{layouts,templates,fields}`.
    pub fn discover(&self, owner: &str, directory: &Path, lister: &dyn DirectoryLister) -> usize {
        let mut count = 0;

        for group in ExtraGroup::ALL {
            let group_dir = directory.join(group.dir_name());
            if !group_dir.is_dir() {
                continue;
            }

            for path in lister.list(&pattern_in(&group_dir, "*")) {
                if !path.is_file() {
                    continue;
                }
                if group.is_data() && !has_data_extension(&path) {
                    continue;
                }
                let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                    continue;
                };
                self.register(group, owner, &stem, ExtraSource::File(path));
                count += 1;
            }
        }

        count
    }

    /// Parse an extra on first access and memoize it.
    ///
    /// Unknown keys and unparseable files yield `None`.
    pub fn load(&self, group: ExtraGroup, key: &str) -> Option<Arc<Extra>> {
        let cache_key = (group, key.to_string());
        if let Some(found) = self
            .loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cache_key)
        {
            return Some(Arc::clone(found));
        }

        let source = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&group)
            .and_then(|entries| entries.get(key))
            .cloned()?;

        let data = match &source {
            ExtraSource::Inline(value) => value.clone(),
            ExtraSource::File(path) if !group.is_data() => {
                Value::String(path.to_string_lossy().to_string())
            }
            ExtraSource::File(path) => match read_data_file(path) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Cannot load {} '{}': {}", group, key, e);
                    return None;
                }
            },
        };

        tracing::debug!("Loaded {} '{}'", group, key);
        let extra = Arc::new(Extra {
            key: key.to_string(),
            source,
            data,
        });

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        Some(Arc::clone(
            loaded.entry(cache_key).or_insert_with(|| Arc::clone(&extra)),
        ))
    }

    /// Resolve a name to a registered key: a qualified `owner.name` is used
    /// as-is, otherwise `<owner>.<name>` then `shared.<name>`.
    pub fn resolve_key(&self, group: ExtraGroup, owner: &str, name: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entries = entries.get(&group)?;

        let candidates = if name.contains('.') {
            vec![name.to_string()]
        } else {
            vec![format!("{}.{}", owner, name), format!("{}.{}", SHARED_OWNER, name)]
        };

        candidates.into_iter().find(|key| entries.contains_key(key))
    }

    /// Registered entries of one owner in a group, in registration order.
    pub fn owned(&self, group: ExtraGroup, owner: &str) -> Vec<(String, ExtraSource)> {
        let prefix = format!("{}.", owner);
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&group)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, source)| (key.clone(), source.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn keys(&self, group: ExtraGroup) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&group)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            DATA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Params and attrs applied to items rendered inside a layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutItem {
    #[serde(default)]
    pub params: Params,

    #[serde(default)]
    pub attrs: Params,
}

/// A layout: a named params/attrs override bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default)]
    pub params: Params,

    #[serde(default)]
    pub attrs: Params,

    #[serde(default)]
    pub item: LayoutItem,
}

impl Layout {
    pub fn from_value(key: Option<String>, value: &Value) -> Self {
        let item = value.get("item").cloned().unwrap_or(Value::Null);
        Self {
            key,
            params: object_at(value, "params"),
            attrs: object_at(value, "attrs"),
            item: LayoutItem {
                params: object_at(&item, "params"),
                attrs: object_at(&item, "attrs"),
            },
        }
    }
}
