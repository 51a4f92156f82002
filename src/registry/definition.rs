//! Component definition files and providers.
//!
//! A definition is either plain data (`component.yaml`, `component.yml` or
//! `component.json` next to the `templates/` directory) or a factory
//! registered in the [`PluginRegistry`]. Data definitions reference behaviour
//! by plugin name:
//!
//! ```yaml
//! title: Heading
//! params:
//!   content: ""
//!   tag: h1
//! attrs:
//!   class: [uk-heading-{size}]
//! render:
//!   computed: heading.has_content
//! cache:
//!   name: heading
//!   expire: 3600
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::descriptor::{
    Capabilities, Child, ComponentDescriptor, Computed, ComputeFn, LayoutRef, Scope,
};
use crate::attributes::Attributes;
use crate::cache::CacheDirective;
use crate::error::ComponentError;
use crate::plugins::PluginRegistry;
use crate::value::{is_truthy, merge, Params};

/// File names tried for a component definition, in order.
pub const DEFINITION_FILES: [&str; 3] = ["component.yaml", "component.yml", "component.json"];

/// Fields a definition contributes to a descriptor. Set fields win over the
/// skeleton.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    pub title: Option<String>,
    pub params: Option<Params>,
    pub parent: Option<String>,
    pub children: Option<Vec<Child>>,
    pub layout: Option<LayoutRef>,
    pub transform: Option<Computed<Params>>,
    pub attrs: Option<Computed<Attributes>>,
    pub render: Option<Computed<bool>>,
    pub cache: Option<Computed<CacheDirective>>,
    pub metadata: Option<Computed<Params>>,
    pub functions: Capabilities,
    pub output: Option<Computed<String>>,
    pub files: Vec<PathBuf>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Params::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn children(mut self, children: Vec<Child>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn layout(mut self, layout: LayoutRef) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Params + Send + Sync + 'static,
    {
        self.transform = Some(Computed::function(f));
        self
    }

    pub fn attrs(mut self, attrs: Computed<Attributes>) -> Self {
        self.attrs = Some(attrs);
        self
    }

    pub fn render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> bool + Send + Sync + 'static,
    {
        self.render = Some(Computed::function(f));
        self
    }

    pub fn cache(mut self, cache: Computed<CacheDirective>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn metadata(mut self, metadata: Computed<Params>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn output(mut self, output: Computed<String>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn helper<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name, std::sync::Arc::new(f));
        self
    }

    /// Merge this definition over a skeleton.
    pub fn apply(self, descriptor: &mut ComponentDescriptor) {
        if let Some(title) = self.title {
            descriptor.title = title;
        }
        if let Some(params) = self.params {
            descriptor.params = merge(&descriptor.params, &params);
        }
        if self.parent.is_some() {
            descriptor.parent = self.parent;
        }
        if let Some(children) = self.children {
            descriptor.children = children;
        }
        if self.layout.is_some() {
            descriptor.layout = self.layout;
        }
        if self.transform.is_some() {
            descriptor.transform = self.transform;
        }
        if self.attrs.is_some() {
            descriptor.attrs = self.attrs;
        }
        if self.render.is_some() {
            descriptor.render = self.render;
        }
        if self.cache.is_some() {
            descriptor.cache = self.cache;
        }
        if self.metadata.is_some() {
            descriptor.metadata = self.metadata;
        }
        if self.output.is_some() {
            descriptor.output = self.output;
        }
        descriptor.functions.extend(&self.functions);
        for file in self.files {
            if !descriptor.files.contains(&file) {
                descriptor.files.push(file);
            }
        }
    }
}

/// Source of a definition: eager data, or a factory resolved on first use.
#[derive(Debug, Clone)]
pub enum Provider {
    Eager(Definition),
    Lazy(String),
}

impl Provider {
    pub fn resolve(self, plugins: &PluginRegistry) -> Result<Definition, ComponentError> {
        match self {
            Provider::Eager(definition) => Ok(definition),
            Provider::Lazy(key) => {
                let factory = plugins.factory(&key)?;
                Ok(factory())
            }
        }
    }
}

/// Find the definition file of a component directory.
pub fn find_definition(directory: &Path) -> Option<PathBuf> {
    DEFINITION_FILES
        .iter()
        .map(|name| directory.join(name))
        .find(|path| path.is_file())
}

/// Read a YAML or JSON data file into a JSON value.
pub fn read_data_file(path: &Path) -> Result<Value, ComponentError> {
    let contents = fs::read_to_string(path).map_err(|e| ComponentError::io(path, e))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let value = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    Ok(value)
}

/// Load a definition file into a provider.
pub fn load_definition(path: &Path, plugins: &PluginRegistry) -> Result<Provider, ComponentError> {
    let value = read_data_file(path)?;
    let map = match value {
        Value::Object(map) => map,
        Value::Null => Params::new(),
        other => {
            return Err(ComponentError::MalformedDefinition {
                path: path.to_path_buf(),
                reason: format!("expected a map, got {}", kind_of(&other)),
            })
        }
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    definition_from_map(&map, plugins, base)
}

/// Build a provider from definition data.
///
/// Unknown plugin references are logged and the key is ignored.
pub fn definition_from_map(
    map: &Params,
    plugins: &PluginRegistry,
    base: &Path,
) -> Result<Provider, ComponentError> {
    if let Some(key) = map.get("factory").and_then(Value::as_str) {
        return Ok(Provider::Lazy(key.to_string()));
    }

    let mut definition = Definition::new();

    definition.title = map.get("title").and_then(Value::as_str).map(str::to_string);
    definition.parent = map.get("parent").and_then(Value::as_str).map(str::to_string);

    let defaults = map.get("defaults").and_then(Value::as_object);
    let params = map.get("params").and_then(Value::as_object);
    definition.params = match (defaults, params) {
        (None, None) => None,
        (defaults, params) => Some(merge(
            &defaults.cloned().unwrap_or_default(),
            &params.cloned().unwrap_or_default(),
        )),
    };

    if let Some(children) = map.get("children") {
        definition.children = Some(Child::list_from_value(children));
    }

    definition.layout = match map.get("layout") {
        Some(Value::String(name)) if !name.is_empty() => Some(LayoutRef::Name(name.clone())),
        Some(Value::Object(inline)) => Some(LayoutRef::Inline(inline.clone())),
        _ => None,
    };

    definition.transform = computed_field(map, "transform", |name| plugins.transform(name), |value| {
        value.as_object().cloned()
    });
    definition.attrs = computed_field(map, "attrs", |name| plugins.attrs(name), |value| {
        value.as_object().map(Attributes::from_params)
    });
    definition.render = computed_field(map, "render", |name| plugins.render(name), |value| {
        Some(is_truthy(value))
    });
    definition.cache = computed_field(map, "cache", |name| plugins.cache(name), |value| {
        serde_json::from_value::<CacheDirective>(value.clone()).ok()
    });
    definition.metadata = computed_field(map, "metadata", |name| plugins.metadata(name), |value| {
        value.as_object().cloned()
    });
    definition.output = computed_field(map, "output", |name| plugins.output(name), |value| {
        value.as_str().map(str::to_string)
    });

    definition.functions = helpers_from(map.get("fn"), plugins);

    if let Some(Value::Array(files)) = map.get("files") {
        definition.files = files
            .iter()
            .filter_map(Value::as_str)
            .map(|file| base.join(file))
            .collect();
    }

    Ok(Provider::Eager(definition))
}

/// Read a computed-capable key: `{computed: name}` looks up a plugin, any
/// other value is converted to a literal.
fn computed_field<T, L, C>(map: &Params, key: &str, lookup: L, literal: C) -> Option<Computed<T>>
where
    L: Fn(&str) -> Result<ComputeFn<T>, ComponentError>,
    C: Fn(&Value) -> Option<T>,
{
    let value = map.get(key)?;

    if let Some(name) = computed_reference(value) {
        return match lookup(name) {
            Ok(compute) => Some(Computed::Function(compute)),
            Err(e) => {
                tracing::warn!("Ignoring '{}' of definition: {}", key, e);
                None
            }
        };
    }

    match literal(value) {
        Some(literal) => Some(Computed::Literal(literal)),
        None => {
            tracing::warn!("Ignoring '{}' of definition: unsupported value {}", key, value);
            None
        }
    }
}

fn computed_reference(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("computed").and_then(Value::as_str)
}

/// `fn: [a, b]` binds helpers under their registered names,
/// `fn: {local: registered}` binds them under local names.
fn helpers_from(value: Option<&Value>, plugins: &PluginRegistry) -> Capabilities {
    let mut functions = Capabilities::new();

    let bindings: Vec<(String, String)> = match value {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| (name.to_string(), name.to_string()))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(local, target)| target.as_str().map(|t| (local.clone(), t.to_string())))
            .collect(),
        _ => Vec::new(),
    };

    for (local, registered) in bindings {
        match plugins.helper(&registered) {
            Ok(helper) => functions.insert(local, helper),
            Err(e) => tracing::warn!("Skipping helper '{}': {}", local, e),
        }
    }

    functions
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
