//! In-memory component descriptor and the value types hanging off it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::cache::CacheDirective;
use crate::value::Params;

/// Arguments handed to every computed field.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub descriptor: &'a ComponentDescriptor,
    pub params: &'a Params,
    pub attrs: &'a Attributes,
    /// Rendered text; empty until the output stage.
    pub output: &'a str,
}

impl<'a> Scope<'a> {
    pub fn new(descriptor: &'a ComponentDescriptor, params: &'a Params, attrs: &'a Attributes) -> Self {
        Self {
            descriptor,
            params,
            attrs,
            output: "",
        }
    }

    pub fn with_output(self, output: &'a str) -> Self {
        Self { output, ..self }
    }
}

/// Callable form of a computed field.
pub type ComputeFn<T> = Arc<dyn Fn(&Scope<'_>) -> T + Send + Sync>;

/// A field that is either a literal value or computed from the render scope.
pub enum Computed<T> {
    Literal(T),
    Function(ComputeFn<T>),
}

impl<T: Clone> Computed<T> {
    /// Evaluate-or-return.
    pub fn resolve(&self, scope: &Scope<'_>) -> T {
        match self {
            Computed::Literal(value) => value.clone(),
            Computed::Function(compute) => compute(scope),
        }
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> T + Send + Sync + 'static,
    {
        Computed::Function(Arc::new(f))
    }
}

impl<T: Clone> Clone for Computed<T> {
    fn clone(&self) -> Self {
        match self {
            Computed::Literal(value) => Computed::Literal(value.clone()),
            Computed::Function(compute) => Computed::Function(Arc::clone(compute)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Computed::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Helper callable exposed to templates.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Named helper table handed to the template renderer.
#[derive(Clone, Default)]
pub struct Capabilities(IndexMap<String, HelperFn>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, helper: HelperFn) {
        self.0.insert(name.into(), helper);
    }

    /// Call a helper; `None` when no helper has that name.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.0.get(name).map(|helper| helper(args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `other` replace same-named entries here.
    pub fn extend(&mut self, other: &Capabilities) {
        for (name, helper) in &other.0 {
            self.0.insert(name.clone(), Arc::clone(helper));
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// One child of a component: literal content, or a nested component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    Text(String),
    Component(ChildComponent),
}

/// A nested component reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildComponent {
    #[serde(alias = "name")]
    pub component: String,

    #[serde(default)]
    pub params: Params,

    #[serde(default)]
    pub attrs: Params,
}

impl Child {
    /// Read children from a loosely-typed value (`params.children`).
    ///
    /// A string is one text child; list entries that are neither strings nor
    /// component maps are skipped.
    pub fn list_from_value(value: &Value) -> Vec<Child> {
        match value {
            Value::String(text) => vec![Child::Text(text.clone())],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match serde_json::from_value::<Child>(item.clone()) {
                    Ok(child) => Some(child),
                    Err(e) => {
                        tracing::warn!("Skipping malformed child {}: {}", item, e);
                        None
                    }
                })
                .collect(),
            Value::Object(_) => serde_json::from_value::<Child>(value.clone())
                .map(|child| vec![child])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// Default layout of a component: a layout name or an inline layout map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutRef {
    Name(String),
    Inline(Params),
}

/// Resolved record for one component.
#[derive(Debug, Clone, Default)]
pub struct ComponentDescriptor {
    pub name: String,
    pub directory: PathBuf,
    pub template: PathBuf,
    pub definition: Option<PathBuf>,
    pub title: String,
    /// Dependency inventory (all files of the component plus declared extras).
    pub files: Vec<PathBuf>,
    /// Default params.
    pub params: Params,
    pub layout: Option<LayoutRef>,
    pub parent: Option<String>,
    pub children: Vec<Child>,
    pub transform: Option<Computed<Params>>,
    pub attrs: Option<Computed<Attributes>>,
    pub render: Option<Computed<bool>>,
    pub cache: Option<Computed<CacheDirective>>,
    pub metadata: Option<Computed<Params>>,
    pub functions: Capabilities,
    pub output: Option<Computed<String>>,
}

impl ComponentDescriptor {
    /// A bare descriptor with only a name, titled after it.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Skeleton created at discovery.
    pub fn skeleton(name: impl Into<String>, directory: PathBuf, template: PathBuf) -> Self {
        Self {
            directory,
            template,
            ..Self::named(name)
        }
    }
}
