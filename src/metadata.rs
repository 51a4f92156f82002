//! Metadata sink: receives the key/value pairs a component emits while it
//! renders (page head entries, asset hints and the like).

use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::Value;

/// Destination of emitted metadata.
pub trait MetadataSink: Send + Sync {
    fn emit(&self, key: &str, value: &Value);
}

/// Collects metadata in emission order; a repeated key keeps its first
/// position and its latest value.
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    entries: Mutex<IndexMap<String, Value>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Take everything emitted so far.
    pub fn drain(&self) -> Vec<(String, Value)> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.drain(..).collect()
    }
}

impl MetadataSink for MemoryMetadata {
    fn emit(&self, key: &str, value: &Value) {
        tracing::debug!("Metadata {} = {}", key, value);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.clone());
    }
}
