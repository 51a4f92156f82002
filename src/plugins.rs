//! Plugin registry for computed fields, template helpers and definition factories.
//!
//! Definition files are plain data, so any behaviour they need is registered
//! here from Rust and referenced by name:
//!
//! ```yaml
//! params:
//!   content: ""
//! render:
//!   computed: heading.has_content
//! fn: [format_date]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::attributes::Attributes;
use crate::cache::CacheDirective;
use crate::error::ComponentError;
use crate::registry::{ComputeFn, Definition, HelperFn, Scope};
use crate::value::Params;

/// Which computed field a plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Transform,
    Attrs,
    Render,
    Cache,
    Metadata,
    Output,
    Helper,
    Factory,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Transform => "transform",
            PluginKind::Attrs => "attrs",
            PluginKind::Render => "render",
            PluginKind::Cache => "cache",
            PluginKind::Metadata => "metadata",
            PluginKind::Output => "output",
            PluginKind::Helper => "helper",
            PluginKind::Factory => "factory",
        };
        f.write_str(name)
    }
}

/// Deferred producer of a component definition.
pub type FactoryFn = Arc<dyn Fn() -> Definition + Send + Sync>;

/// Registry for named plugins
#[derive(Default)]
pub struct PluginRegistry {
    transforms: HashMap<String, ComputeFn<Params>>,
    attrs: HashMap<String, ComputeFn<Attributes>>,
    guards: HashMap<String, ComputeFn<bool>>,
    caches: HashMap<String, ComputeFn<CacheDirective>>,
    metadata: HashMap<String, ComputeFn<Params>>,
    outputs: HashMap<String, ComputeFn<String>>,
    helpers: HashMap<String, HelperFn>,
    factories: HashMap<String, FactoryFn>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a params transform
    ///
    /// # Example
    ///
    /// ```ignore
    /// use componentry::PluginRegistry;
    ///
    /// let mut plugins = PluginRegistry::new();
    /// plugins.register_transform("heading.wrap_line", |scope| {
    ///     let mut params = scope.params.clone();
    ///     params.insert("content".into(), "<span>...</span>".into());
    ///     params
    /// });
    /// ```
    pub fn register_transform<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> Params + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }

    pub fn register_attrs<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> Attributes + Send + Sync + 'static,
    {
        self.attrs.insert(name.into(), Arc::new(f));
    }

    /// Register a render guard
    pub fn register_render<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Arc::new(f));
    }

    pub fn register_cache<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> CacheDirective + Send + Sync + 'static,
    {
        self.caches.insert(name.into(), Arc::new(f));
    }

    pub fn register_metadata<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> Params + Send + Sync + 'static,
    {
        self.metadata.insert(name.into(), Arc::new(f));
    }

    /// Register an output transform; the rendered text is `scope.output`
    pub fn register_output<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Scope<'_>) -> String + Send + Sync + 'static,
    {
        self.outputs.insert(name.into(), Arc::new(f));
    }

    /// Register a template helper, referenced from a definition's `fn` list
    pub fn register_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(f));
    }

    /// Register a definition factory under a stable key
    ///
    /// A definition file containing `factory: <key>` defers to it; a factory
    /// registered under a component's own name is used even without a file.
    pub fn register_factory<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn() -> Definition + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(f));
    }

    pub fn transform(&self, name: &str) -> Result<ComputeFn<Params>, ComponentError> {
        lookup(&self.transforms, PluginKind::Transform, name)
    }

    pub fn attrs(&self, name: &str) -> Result<ComputeFn<Attributes>, ComponentError> {
        lookup(&self.attrs, PluginKind::Attrs, name)
    }

    pub fn render(&self, name: &str) -> Result<ComputeFn<bool>, ComponentError> {
        lookup(&self.guards, PluginKind::Render, name)
    }

    pub fn cache(&self, name: &str) -> Result<ComputeFn<CacheDirective>, ComponentError> {
        lookup(&self.caches, PluginKind::Cache, name)
    }

    pub fn metadata(&self, name: &str) -> Result<ComputeFn<Params>, ComponentError> {
        lookup(&self.metadata, PluginKind::Metadata, name)
    }

    pub fn output(&self, name: &str) -> Result<ComputeFn<String>, ComponentError> {
        lookup(&self.outputs, PluginKind::Output, name)
    }

    pub fn helper(&self, name: &str) -> Result<HelperFn, ComponentError> {
        lookup(&self.helpers, PluginKind::Helper, name)
    }

    pub fn factory(&self, key: &str) -> Result<FactoryFn, ComponentError> {
        lookup(&self.factories, PluginKind::Factory, key)
    }

    pub fn has_factory(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Get list of registered plugin names of one kind
    pub fn list(&self, kind: PluginKind) -> Vec<String> {
        let mut names: Vec<String> = match kind {
            PluginKind::Transform => self.transforms.keys().cloned().collect(),
            PluginKind::Attrs => self.attrs.keys().cloned().collect(),
            PluginKind::Render => self.guards.keys().cloned().collect(),
            PluginKind::Cache => self.caches.keys().cloned().collect(),
            PluginKind::Metadata => self.metadata.keys().cloned().collect(),
            PluginKind::Output => self.outputs.keys().cloned().collect(),
            PluginKind::Helper => self.helpers.keys().cloned().collect(),
            PluginKind::Factory => self.factories.keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

fn lookup<F: Clone>(table: &HashMap<String, F>, kind: PluginKind, name: &str) -> Result<F, ComponentError> {
    table
        .get(name)
        .cloned()
        .ok_or_else(|| ComponentError::Plugin(format!("{} plugin not found: {}", kind, name)))
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("transforms", &self.list(PluginKind::Transform))
            .field("render", &self.list(PluginKind::Render))
            .field("helpers", &self.list(PluginKind::Helper))
            .field("factories", &self.list(PluginKind::Factory))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentDescriptor;
    use serde_json::json;

    #[test]
    fn test_register_and_call_guard() {
        let mut plugins = PluginRegistry::new();
        plugins.register_render("has_content", |scope: &Scope<'_>| {
            scope.params.get("content").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false)
        });

        let guard = plugins.render("has_content").unwrap();
        let descriptor = ComponentDescriptor::named("heading");
        let attrs = Attributes::new();

        let params = json!({"content": "Hi"}).as_object().cloned().unwrap();
        assert!(guard(&Scope::new(&descriptor, &params, &attrs)));

        let params = json!({"content": ""}).as_object().cloned().unwrap();
        assert!(!guard(&Scope::new(&descriptor, &params, &attrs)));
    }

    #[test]
    fn test_plugin_not_found() {
        let plugins = PluginRegistry::new();
        let result = plugins.transform("nonexistent");
        assert!(matches!(result, Err(ComponentError::Plugin(_))));
    }

    #[test]
    fn test_list_by_kind() {
        let mut plugins = PluginRegistry::new();
        plugins.register_helper("b", |_: &[Value]| Value::Null);
        plugins.register_helper("a", |_: &[Value]| Value::Null);
        plugins.register_factory("card", Definition::default);

        assert_eq!(plugins.list(PluginKind::Helper), vec!["a".to_string(), "b".to_string()]);
        assert!(plugins.has_factory("card"));
        assert!(plugins.list(PluginKind::Transform).is_empty());
    }
}
