//! Error type shared by the registry, the extras store and the render pipeline.
//!
//! Most failure modes of a component render are absorbed into an empty result
//! (components are inline page fragments). The variants below are what the
//! internals propagate with `?` before that decision is made.

use std::fmt;
use std::path::PathBuf;

/// Error type for component operations
#[derive(Debug, Clone)]
pub enum ComponentError {
    /// Unknown component, extra or layout.
    NotFound(String),
    /// A definition file that did not yield a map.
    MalformedDefinition {
        path: PathBuf,
        reason: String,
    },
    /// YAML / JSON / expression parse failure.
    Parse(String),
    Io {
        path: PathBuf,
        reason: String,
    },
    Cache(String),
    Render(String),
    Plugin(String),
    /// Render depth exceeded; carries the chain of component names.
    Cycle {
        chain: Vec<String>,
    },
}

impl ComponentError {
    pub fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        ComponentError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Errors that the pipeline swallows into an empty render.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ComponentError::NotFound(_) | ComponentError::MalformedDefinition { .. }
        )
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::NotFound(name) => write!(f, "Not found: {}", name),
            ComponentError::MalformedDefinition { path, reason } => {
                write!(f, "Malformed definition {}: {}", path.display(), reason)
            }
            ComponentError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ComponentError::Io { path, reason } => {
                write!(f, "I/O error on {}: {}", path.display(), reason)
            }
            ComponentError::Cache(msg) => write!(f, "Cache error: {}", msg),
            ComponentError::Render(msg) => write!(f, "Render error: {}", msg),
            ComponentError::Plugin(msg) => write!(f, "Plugin error: {}", msg),
            ComponentError::Cycle { chain } => {
                write!(f, "Component nesting too deep: {}", chain.join(" -> "))
            }
        }
    }
}

impl std::error::Error for ComponentError {}

impl From<serde_yaml::Error> for ComponentError {
    fn from(err: serde_yaml::Error) -> Self {
        ComponentError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ComponentError {
    fn from(err: serde_json::Error) -> Self {
        ComponentError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_lists_chain() {
        let err = ComponentError::Cycle {
            chain: vec!["menu".to_string(), "item".to_string(), "menu".to_string()],
        };
        assert_eq!(err.to_string(), "Component nesting too deep: menu -> item -> menu");
    }

    #[test]
    fn test_soft_errors() {
        assert!(ComponentError::NotFound("card".to_string()).is_soft());
        assert!(!ComponentError::Cycle { chain: vec![] }.is_soft());
        assert!(!ComponentError::Render("boom".to_string()).is_soft());
    }
}
