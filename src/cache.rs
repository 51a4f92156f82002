//! Render-result caching: directive, policy, and the cache store boundary.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// Cache directive of one render: a name and an expiry in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDirective {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub expire: Option<u64>,
}

impl CacheDirective {
    pub fn new(name: impl Into<String>, expire: u64) -> Self {
        Self {
            name: Some(name.into()),
            expire: Some(expire),
        }
    }

    /// Both a name and a non-zero expiry are present.
    pub fn is_active(&self) -> bool {
        let named = self.name.as_deref().map(|n| !n.is_empty()).unwrap_or(false);
        named && self.expire.unwrap_or(0) > 0
    }

    pub fn is_unset(&self) -> bool {
        self.name.is_none() && self.expire.is_none()
    }
}

/// Whether render caching is enabled for a request.
///
/// Disabled by the global flag, or while debugging as a privileged user.
pub fn caching_enabled(disable_cache: bool, debug: bool, privileged: bool) -> bool {
    !disable_cache && !(debug && privileged)
}

/// Store key for a cached render.
pub fn cache_key(module_id: &str, component: &str, cache_name: &str) -> String {
    format!("{}:{}:{}", module_id, component, cache_name)
}

/// Key/value store for rendered output. Expiry is the store's concern.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ComponentError>;

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ComponentError>;

    fn delete(&self, key: &str) -> Result<bool, ComponentError>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ComponentError>;
}

/// In-process store with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, ComponentError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ComponentError> {
        let expires = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, ComponentError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ComponentError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
