//! Per-render state: the mutable context built up by the pipeline and the
//! flattened envelope handed to the template renderer.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use super::stage::{Stage, StageTracker};
use crate::attributes::Attributes;
use crate::cache::CacheDirective;
use crate::extras::{Layout, LayoutItem};
use crate::registry::{Capabilities, Child, ComponentDescriptor};
use crate::value::Params;

/// What a child sees of the component rendering it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentRef {
    pub name: String,
    pub id: String,
    pub params: Params,
    /// Overrides the parent's layout applies to each of its items.
    pub item: LayoutItem,
}

impl ParentRef {
    fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "id": self.id,
            "params": self.params,
        })
    }
}

/// Merged state of one render. Owns copies of everything it takes from the
/// descriptor.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub descriptor: Arc<ComponentDescriptor>,
    pub params: Params,
    pub attrs: Attributes,
    pub children: Vec<Child>,
    pub layout: Option<Layout>,
    pub parent: Option<ParentRef>,
    pub functions: Capabilities,
    pub cache: CacheDirective,
    pub chain: Vec<String>,
    stages: StageTracker,
}

impl RenderContext {
    pub(crate) fn new(descriptor: Arc<ComponentDescriptor>, chain: Vec<String>) -> Self {
        Self {
            stages: StageTracker::new(descriptor.name.clone()),
            descriptor,
            params: Params::new(),
            attrs: Attributes::new(),
            children: Vec::new(),
            layout: None,
            parent: None,
            functions: Capabilities::new(),
            cache: CacheDirective::default(),
            chain,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stages.current()
    }

    pub(crate) fn advance(&mut self, next: Stage) {
        self.stages.advance(next);
    }

    /// Flatten into the renderer's envelope.
    pub(crate) fn envelope(&self) -> RenderEnvelope {
        let descriptor = &self.descriptor;
        RenderEnvelope {
            name: descriptor.name.clone(),
            title: descriptor.title.clone(),
            template: descriptor.template.clone(),
            directory: descriptor.directory.clone(),
            definition: descriptor.definition.clone(),
            parent: self.parent.clone(),
            params: self.params.clone(),
            attrs: self.attrs.clone(),
            children: self.children.clone(),
            layout: self.layout.clone(),
            functions: self.functions.clone(),
            chain: self.chain.clone(),
        }
    }
}

/// Variables of one render as seen by a [`TemplateRenderer`](crate::renderer::TemplateRenderer).
#[derive(Debug, Clone)]
pub struct RenderEnvelope {
    pub name: String,
    pub title: String,
    pub template: PathBuf,
    pub directory: PathBuf,
    pub definition: Option<PathBuf>,
    pub parent: Option<ParentRef>,
    pub params: Params,
    pub attrs: Attributes,
    pub children: Vec<Child>,
    pub layout: Option<Layout>,
    pub functions: Capabilities,
    /// Component names from the outermost render down to this one.
    pub chain: Vec<String>,
}

impl RenderEnvelope {
    pub fn id(&self) -> String {
        self.attrs.id()
    }

    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// The item overrides of this component's layout, as inherited by its
    /// children.
    pub fn as_parent(&self) -> ParentRef {
        ParentRef {
            name: self.name.clone(),
            id: self.id(),
            params: self.params.clone(),
            item: self
                .layout
                .as_ref()
                .map(|layout| layout.item.clone())
                .unwrap_or_default(),
        }
    }

    /// Template variables as a JSON map, for engines that take plain data.
    /// Helpers are listed by name only.
    pub fn to_variables(&self) -> Params {
        let mut variables = Params::new();
        variables.insert("name".to_string(), json!(self.name));
        variables.insert("title".to_string(), json!(self.title));
        variables.insert("id".to_string(), json!(self.id()));
        variables.insert(
            "template".to_string(),
            json!(self.template.to_string_lossy()),
        );
        variables.insert(
            "directory".to_string(),
            json!(self.directory.to_string_lossy()),
        );
        variables.insert(
            "definition".to_string(),
            self.definition
                .as_ref()
                .map(|path| json!(path.to_string_lossy()))
                .unwrap_or(Value::Null),
        );
        variables.insert(
            "parent".to_string(),
            self.parent
                .as_ref()
                .map(ParentRef::to_value)
                .unwrap_or(Value::Null),
        );
        variables.insert("params".to_string(), Value::Object(self.params.clone()));
        variables.insert("attrs".to_string(), Value::Object(self.attrs.to_params()));
        variables.insert(
            "children".to_string(),
            serde_json::to_value(&self.children).unwrap_or(Value::Null),
        );
        variables.insert(
            "layout".to_string(),
            self.layout
                .as_ref()
                .and_then(|layout| serde_json::to_value(layout).ok())
                .unwrap_or(Value::Null),
        );
        variables.insert("functions".to_string(), json!(self.functions.names()));
        variables
    }
}
