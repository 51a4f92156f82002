//! Engine configuration schema
//!
//! Loaded from a YAML file (every key optional) and then overridden from the
//! environment:
//!
//! ```yaml
//! roots: [components, site/components]
//! module_id: component
//! debug: false
//! disable_cache: false
//! cache_dir: .cache/componentry
//! locale: default
//! max_depth: 32
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;
use crate::fields::DEFAULT_LOCALE;

pub const ENV_DEBUG: &str = "COMPONENTRY_DEBUG";
pub const ENV_DISABLE_CACHE: &str = "COMPONENTRY_DISABLE_CACHE";
pub const ENV_LOCALE: &str = "COMPONENTRY_LOCALE";
pub const ENV_CACHE_DIR: &str = "COMPONENTRY_CACHE_DIR";

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Discovery roots; later roots override earlier components of the same name
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Namespace of render cache keys
    #[serde(default = "default_module_id")]
    pub module_id: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub disable_cache: bool,

    /// Directory of derived field-cache artifacts
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_locale")]
    pub locale: String,

    /// Deepest allowed component nesting
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_module_id() -> String {
    "component".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/componentry")
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_max_depth() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            module_id: default_module_id(),
            debug: false,
            disable_cache: false,
            cache_dir: default_cache_dir(),
            locale: default_locale(),
            max_depth: default_max_depth(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// Relative roots and cache dir are resolved against the file's directory.
    /// An empty file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ComponentError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ComponentError::io(path, e))?;

        let mut config: EngineConfig = if contents.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ComponentError::Parse(format!("{}: {}", path.display(), e)))?
        };

        if let Some(base) = path.parent() {
            config.roots = config.roots.iter().map(|root| base.join(root)).collect();
            if config.cache_dir.is_relative() {
                config.cache_dir = base.join(&config.cache_dir);
            }
        }

        Ok(config)
    }

    /// Apply `COMPONENTRY_*` environment overrides.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEBUG) {
            self.debug = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_DISABLE_CACHE) {
            self.disable_cache = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_LOCALE).filter(|v| !v.is_empty()) {
            self.locale = value;
        }
        if let Some(value) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache_dir = PathBuf::from(value);
        }
        self
    }

    pub fn with_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.roots.extend(roots);
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
