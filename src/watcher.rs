//! Modification watcher: folds dependency files and timestamps into a single
//! freshness value.
//!
//! Derived caches compare their own timestamp against [`Watcher::modified`]
//! and regenerate when any watched source is newer.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::RwLock;

use indexmap::IndexSet;

use crate::fields::file_timestamp;

/// Something to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// Unix timestamp in seconds.
    Timestamp(i64),
    Path(PathBuf),
    /// A component name; expands to its file inventory.
    Component(String),
    Many(Vec<WatchTarget>),
}

impl From<i64> for WatchTarget {
    fn from(timestamp: i64) -> Self {
        WatchTarget::Timestamp(timestamp)
    }
}

impl From<PathBuf> for WatchTarget {
    fn from(path: PathBuf) -> Self {
        WatchTarget::Path(path)
    }
}

impl From<&Path> for WatchTarget {
    fn from(path: &Path) -> Self {
        WatchTarget::Path(path.to_path_buf())
    }
}

/// A string with a path separator is a path, a bare word is a component name.
impl From<&str> for WatchTarget {
    fn from(target: &str) -> Self {
        if target.contains('/') || target.contains(MAIN_SEPARATOR) {
            WatchTarget::Path(PathBuf::from(target))
        } else {
            WatchTarget::Component(target.to_string())
        }
    }
}

impl From<String> for WatchTarget {
    fn from(target: String) -> Self {
        WatchTarget::from(target.as_str())
    }
}

impl<T: Into<WatchTarget>> From<Vec<T>> for WatchTarget {
    fn from(targets: Vec<T>) -> Self {
        WatchTarget::Many(targets.into_iter().map(Into::into).collect())
    }
}

/// Resolves a component name to the files it depends on.
pub trait FileInventory {
    fn inventory(&self, component: &str) -> Option<Vec<PathBuf>>;
}

/// A watched item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchEntry {
    Timestamp(i64),
    Path(PathBuf),
}

/// Process-wide set of watched items.
#[derive(Debug, Default)]
pub struct Watcher {
    entries: RwLock<IndexSet<WatchEntry>>,
}

impl Watcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target to the watched set. Unknown component names add nothing.
    pub fn watch(&self, target: impl Into<WatchTarget>, inventory: &dyn FileInventory) -> &Self {
        let mut collected = Vec::new();
        collect(target.into(), inventory, &mut collected);

        if !collected.is_empty() {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.extend(collected);
        }
        self
    }

    /// Latest timestamp over everything watched; `0` when nothing resolves.
    ///
    /// Paths that no longer exist are skipped.
    pub fn modified(&self) -> i64 {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|entry| match entry {
                WatchEntry::Timestamp(ts) => Some(*ts),
                WatchEntry::Path(path) => file_timestamp(path),
            })
            .max()
            .unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<WatchEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect(target: WatchTarget, inventory: &dyn FileInventory, out: &mut Vec<WatchEntry>) {
    match target {
        WatchTarget::Timestamp(ts) => out.push(WatchEntry::Timestamp(ts)),
        WatchTarget::Path(path) => out.push(WatchEntry::Path(path)),
        WatchTarget::Component(name) => match inventory.inventory(&name) {
            Some(files) => out.extend(files.into_iter().map(WatchEntry::Path)),
            None => tracing::debug!("Not watching unknown component '{}'", name),
        },
        WatchTarget::Many(targets) => {
            for target in targets {
                collect(target, inventory, out);
            }
        }
    }
}
