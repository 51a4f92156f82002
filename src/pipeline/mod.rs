//! Merge pipeline and the engine service object.
//!
//! A [`ComponentEngine`] owns every process-wide table (registry, extras,
//! watcher, memoized expressions) and the external collaborators (template
//! renderer, cache store, metadata sink, directory lister). It is built once,
//! populated by [`ComponentEngine::discover`], and then shared by reference
//! across renders.
//!
//! One render moves through the [`Stage`]s in order:
//!
//! ```text
//! Loaded → DefaultsApplied → ParamsMerged → LayoutApplied → ChildrenResolved
//!   → FunctionsBound → AttrsBuilt → TransformApplied → RenderGuardEvaluated
//!   → MetadataApplied → ParametersFlattened → CacheChecked → Rendered
//!   → OutputTransformed
//! ```
//!
//! A false render guard ends the render with empty output. Unknown components
//! render as the empty string. A nested render that fails is logged and
//! replaced by `""`, so one broken child never takes its page down; only
//! nesting deeper than `max_depth` and failures of the outermost render are
//! returned as errors.
//!
//! The chain of components being rendered is tracked per thread inside the
//! engine, so a renderer that calls [`ComponentEngine::render`] re-entrantly
//! is still bounded by `max_depth`.

mod envelope;
mod stage;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use serde_json::Value;

pub use envelope::{ParentRef, RenderContext, RenderEnvelope};
pub use stage::{Stage, StageTracker};

use crate::attributes::{self, Attributes};
use crate::cache::{cache_key, caching_enabled, CacheDirective, CacheStore, MemoryCacheStore};
use crate::config::EngineConfig;
use crate::error::ComponentError;
use crate::expression::ExpressionEngine;
use crate::extras::{Extra, ExtraGroup, ExtrasStore, Layout, SHARED_OWNER};
use crate::fields::{localize, shape_fields, FieldCache, FieldOptions};
use crate::lister::{DirectoryLister, GlobLister};
use crate::metadata::{MemoryMetadata, MetadataSink};
use crate::plugins::PluginRegistry;
use crate::registry::{
    read_data_file, Child, ComponentDescriptor, Computed, LayoutRef, Registry, Scope,
};
use crate::renderer::{PlaceholderRenderer, TemplateRenderer};
use crate::value::{merge, Params};
use crate::watcher::{FileInventory, WatchTarget, Watcher};

/// Marker replaced by the rendered text in a literal output wrapper.
const OUTPUT_MARKER: &str = "{output}";

/// What to render: a registered name, or an already-resolved descriptor.
#[derive(Debug, Clone)]
pub enum RenderTarget {
    Name(String),
    Descriptor(Arc<ComponentDescriptor>),
}

impl From<&str> for RenderTarget {
    fn from(name: &str) -> Self {
        RenderTarget::Name(name.to_string())
    }
}

impl From<String> for RenderTarget {
    fn from(name: String) -> Self {
        RenderTarget::Name(name)
    }
}

impl From<Arc<ComponentDescriptor>> for RenderTarget {
    fn from(descriptor: Arc<ComponentDescriptor>) -> Self {
        RenderTarget::Descriptor(descriptor)
    }
}

impl From<ComponentDescriptor> for RenderTarget {
    fn from(descriptor: ComponentDescriptor) -> Self {
        RenderTarget::Descriptor(Arc::new(descriptor))
    }
}

/// Caller input of one render.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub params: Params,
    pub attrs: Attributes,
    /// Explicit cache directive; replaces the descriptor's when set.
    pub cache: CacheDirective,
    /// Whether the caller is an elevated user (disables caching in debug).
    pub privileged: bool,
    parent: Option<ParentRef>,
}

impl RenderRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn cache(mut self, name: impl Into<String>, expire: u64) -> Self {
        self.cache = CacheDirective::new(name, expire);
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    fn child_of(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Field-set input of [`ComponentEngine::load_component_fields`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldsSource {
    /// Key in the `fields` extras group.
    Key(String),
    Inline(Value),
}

/// Builder for [`ComponentEngine`].
pub struct ComponentEngineBuilder {
    config: EngineConfig,
    plugins: PluginRegistry,
    renderer: Option<Box<dyn TemplateRenderer>>,
    cache: Option<Arc<dyn CacheStore>>,
    metadata: Option<Arc<dyn MetadataSink>>,
    lister: Option<Box<dyn DirectoryLister>>,
}

impl ComponentEngineBuilder {
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn metadata_sink(mut self, metadata: Arc<dyn MetadataSink>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn lister(mut self, lister: impl DirectoryLister + 'static) -> Self {
        self.lister = Some(Box::new(lister));
        self
    }

    pub fn build(self) -> ComponentEngine {
        let fields = FieldCache::new(self.config.cache_dir.join("fields"));
        ComponentEngine {
            registry: Registry::new(),
            extras: ExtrasStore::new(),
            watcher: Watcher::new(),
            expressions: ExpressionEngine::new(),
            plugins: self.plugins,
            renderer: self
                .renderer
                .unwrap_or_else(|| Box::new(PlaceholderRenderer::new())),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(MemoryCacheStore::new())),
            metadata: self
                .metadata
                .unwrap_or_else(|| Arc::new(MemoryMetadata::new())),
            lister: self.lister.unwrap_or_else(|| Box::new(GlobLister)),
            fields,
            active: Mutex::new(HashMap::new()),
            config: self.config,
        }
    }
}

/// Component service: registry, extras, watcher and the render pipeline.
pub struct ComponentEngine {
    config: EngineConfig,
    registry: Registry,
    extras: ExtrasStore,
    watcher: Watcher,
    expressions: ExpressionEngine,
    plugins: PluginRegistry,
    renderer: Box<dyn TemplateRenderer>,
    cache: Arc<dyn CacheStore>,
    metadata: Arc<dyn MetadataSink>,
    lister: Box<dyn DirectoryLister>,
    fields: FieldCache,
    /// Component chain of the render in progress on each thread.
    active: Mutex<HashMap<ThreadId, Vec<String>>>,
}

/// Restores the thread's previous render chain when a nested render ends.
struct ChainGuard<'a> {
    active: &'a Mutex<HashMap<ThreadId, Vec<String>>>,
    thread: ThreadId,
    previous: Vec<String>,
}

impl<'a> ChainGuard<'a> {
    fn enter(active: &'a Mutex<HashMap<ThreadId, Vec<String>>>, chain: Vec<String>) -> Self {
        let thread = thread::current().id();
        let previous = active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(thread, chain)
            .unwrap_or_default();
        Self {
            active,
            thread,
            previous,
        }
    }
}

impl Drop for ChainGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if self.previous.is_empty() {
            active.remove(&self.thread);
        } else {
            active.insert(self.thread, std::mem::take(&mut self.previous));
        }
    }
}

impl ComponentEngine {
    pub fn builder(config: EngineConfig) -> ComponentEngineBuilder {
        ComponentEngineBuilder {
            config,
            plugins: PluginRegistry::new(),
            renderer: None,
            cache: None,
            metadata: None,
            lister: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn extras(&self) -> &ExtrasStore {
        &self.extras
    }

    pub fn expressions(&self) -> &ExpressionEngine {
        &self.expressions
    }

    /// Scan the configured roots for components and extras.
    ///
    /// Returns the registered component names in discovery order.
    pub fn discover(&self) -> Vec<String> {
        for root in &self.config.roots {
            let found = self
                .registry
                .discover(std::slice::from_ref(root), self.lister.as_ref());
            tracing::info!("Discovered {} components in {}", found.len(), root.display());

            for name in found {
                if let Some(skeleton) = self.registry.skeleton(&name) {
                    self.extras
                        .discover(&name, &skeleton.directory, self.lister.as_ref());
                }
            }
            self.extras
                .discover(SHARED_OWNER, root, self.lister.as_ref());
        }
        self.registry.names()
    }

    /// Register a component directly, bypassing discovery.
    pub fn register(&self, descriptor: ComponentDescriptor) {
        self.registry.register(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.registry.get(name, &self.plugins)
    }

    /// Resolve a component and run the merge stages up to attribute building.
    ///
    /// `None` for an unknown name.
    pub fn load(&self, name: &str, request: &RenderRequest) -> Option<RenderContext> {
        let descriptor = self.get(name)?;
        Some(self.prepare(descriptor, request, vec![name.to_string()]))
    }

    /// Render a component by name or descriptor.
    ///
    /// Unknown components render as `""`.
    pub fn render(
        &self,
        target: impl Into<RenderTarget>,
        request: RenderRequest,
    ) -> Result<String, ComponentError> {
        self.render_nested(target.into(), request, &[])
    }

    /// Render one child of `parent`: text is returned as-is, a component
    /// inherits the parent layout's item overrides.
    ///
    /// A failing child renders as `""`; only [`ComponentError::Cycle`] is
    /// returned.
    pub fn render_child(
        &self,
        child: &Child,
        parent: &RenderEnvelope,
    ) -> Result<String, ComponentError> {
        match child {
            Child::Text(text) => Ok(text.clone()),
            Child::Component(component) => {
                let request = RenderRequest::new()
                    .params(component.params.clone())
                    .attrs(Attributes::from_params(&component.attrs))
                    .child_of(parent.as_parent());
                match self.render_nested(
                    RenderTarget::Name(component.component.clone()),
                    request,
                    &parent.chain,
                ) {
                    Err(e @ ComponentError::Cycle { .. }) => Err(e),
                    Err(e) => {
                        tracing::warn!(
                            "Child '{}' of '{}' failed to render: {}",
                            component.component,
                            parent.name,
                            e
                        );
                        Ok(String::new())
                    }
                    Ok(output) => Ok(output),
                }
            }
        }
    }

    /// Concatenate rendered children in order.
    pub fn render_children(
        &self,
        children: &[Child],
        parent: &RenderEnvelope,
    ) -> Result<String, ComponentError> {
        let mut output = String::new();
        for child in children {
            output.push_str(&self.render_child(child, parent)?);
        }
        Ok(output)
    }

    /// Render below whatever this thread is already rendering. `chain` is
    /// only used when no render is in progress.
    fn render_nested(
        &self,
        target: RenderTarget,
        request: RenderRequest,
        chain: &[String],
    ) -> Result<String, ComponentError> {
        let descriptor = match target {
            RenderTarget::Descriptor(descriptor) => descriptor,
            RenderTarget::Name(name) => match self.get(&name) {
                Some(descriptor) => descriptor,
                None => {
                    tracing::debug!("Component '{}' not found", name);
                    return Ok(String::new());
                }
            },
        };

        let mut chain = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&thread::current().id())
            .cloned()
            .unwrap_or_else(|| chain.to_vec());
        chain.push(descriptor.name.clone());
        if chain.len() > self.config.max_depth {
            return Err(ComponentError::Cycle { chain });
        }

        let _guard = ChainGuard::enter(&self.active, chain.clone());
        let mut context = self.prepare(descriptor, &request, chain);
        self.finish(&mut context, &request)
    }

    /// Stages `Loaded` through `AttrsBuilt`.
    fn prepare(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        request: &RenderRequest,
        chain: Vec<String>,
    ) -> RenderContext {
        let mut context = RenderContext::new(Arc::clone(&descriptor), chain);
        context.parent = request.parent.clone();

        context.params = descriptor.params.clone();
        context.advance(Stage::DefaultsApplied);

        let called = merge(&context.params, &request.params);
        context.advance(Stage::ParamsMerged);

        context.layout = self.resolve_layout(&descriptor, &called);
        let item = context
            .parent
            .as_ref()
            .map(|parent| parent.item.clone())
            .unwrap_or_default();
        let layout_params = context
            .layout
            .as_ref()
            .map(|layout| layout.params.clone())
            .unwrap_or_default();
        let layout_attrs = context
            .layout
            .as_ref()
            .map(|layout| Attributes::from_params(&layout.attrs))
            .unwrap_or_default();

        let mut params = merge(&context.params, &layout_params);
        params = merge(&params, &item.params);
        context.params = merge(&params, &request.params);

        let supplied = request
            .attrs
            .merged_under(&Attributes::from_params(&item.attrs).merged_under(&layout_attrs));
        context.advance(Stage::LayoutApplied);

        context.children = if descriptor.children.is_empty() {
            context
                .params
                .get("children")
                .map(Child::list_from_value)
                .unwrap_or_default()
        } else {
            descriptor.children.clone()
        };
        context.advance(Stage::ChildrenResolved);

        context.functions = descriptor.functions.clone();
        context.advance(Stage::FunctionsBound);

        context.attrs = attributes::build(&supplied, &descriptor, &context.params);
        context.advance(Stage::AttrsBuilt);

        context
    }

    /// Stages `TransformApplied` through `OutputTransformed`.
    fn finish(
        &self,
        context: &mut RenderContext,
        request: &RenderRequest,
    ) -> Result<String, ComponentError> {
        let descriptor = Arc::clone(&context.descriptor);

        if let Some(transform) = &descriptor.transform {
            context.params = match transform {
                Computed::Literal(map) => merge(&context.params, map),
                Computed::Function(compute) => {
                    compute(&Scope::new(&descriptor, &context.params, &context.attrs))
                }
            };
        }
        context.advance(Stage::TransformApplied);

        let allowed = descriptor
            .render
            .as_ref()
            .map(|guard| guard.resolve(&Scope::new(&descriptor, &context.params, &context.attrs)))
            .unwrap_or(true);
        context.advance(Stage::RenderGuardEvaluated);
        if !allowed {
            tracing::debug!("Render guard of '{}' declined", descriptor.name);
            return Ok(String::new());
        }

        if let Some(metadata) = &descriptor.metadata {
            let entries =
                metadata.resolve(&Scope::new(&descriptor, &context.params, &context.attrs));
            for (key, value) in &entries {
                self.metadata.emit(key, value);
            }
        }
        context.advance(Stage::MetadataApplied);

        context.cache = if request.cache.is_unset() {
            descriptor
                .cache
                .as_ref()
                .map(|cache| cache.resolve(&Scope::new(&descriptor, &context.params, &context.attrs)))
                .unwrap_or_default()
        } else {
            request.cache.clone()
        };
        let envelope = context.envelope();
        context.advance(Stage::ParametersFlattened);

        let cached = self.is_cacheable(request.privileged) && context.cache.is_active();
        context.advance(Stage::CacheChecked);

        let rendered = if cached {
            self.render_cached(&envelope, &context.cache)?
        } else {
            self.renderer.render(&envelope.template, &envelope, self)?
        };
        context.advance(Stage::Rendered);

        let output = match &descriptor.output {
            Some(Computed::Literal(wrapper)) if wrapper.contains(OUTPUT_MARKER) => {
                wrapper.replace(OUTPUT_MARKER, &rendered)
            }
            Some(Computed::Literal(replacement)) => replacement.clone(),
            Some(Computed::Function(compute)) => compute(
                &Scope::new(&descriptor, &context.params, &context.attrs).with_output(&rendered),
            ),
            None => rendered,
        };
        context.advance(Stage::OutputTransformed);

        Ok(output)
    }

    /// Serve from the cache store, rendering and storing on a miss. Store
    /// failures fall back to the direct render.
    fn render_cached(
        &self,
        envelope: &RenderEnvelope,
        directive: &CacheDirective,
    ) -> Result<String, ComponentError> {
        let name = directive.name.as_deref().unwrap_or_default();
        let ttl = directive.expire.unwrap_or(0);
        let key = cache_key(&self.config.module_id, &envelope.name, name);

        match self.cache.get(&key) {
            Ok(Some(hit)) => {
                tracing::debug!("Cache hit {}", key);
                return Ok(hit);
            }
            Ok(None) => tracing::debug!("Cache miss {}", key),
            Err(e) => {
                tracing::warn!("Cache lookup of {} failed, rendering directly: {}", key, e);
                return self.renderer.render(&envelope.template, envelope, self);
            }
        }

        let rendered = self.renderer.render(&envelope.template, envelope, self)?;
        if let Err(e) = self.cache.set(&key, &rendered, ttl) {
            tracing::warn!("Cannot store {} in cache: {}", key, e);
        }
        Ok(rendered)
    }

    /// Whether renders may use the cache store.
    pub fn is_cacheable(&self, privileged: bool) -> bool {
        caching_enabled(self.config.disable_cache, self.config.debug, privileged)
    }

    /// Delete cached renders of one component, or of every component.
    ///
    /// Returns the number of entries removed.
    pub fn clear_cache(&self, component: Option<&str>) -> Result<usize, ComponentError> {
        let prefix = match component {
            Some(name) => cache_key(&self.config.module_id, name, ""),
            None => format!("{}:", self.config.module_id),
        };

        let mut removed = 0;
        for key in self.cache.keys_with_prefix(&prefix)? {
            if self.cache.delete(&key)? {
                removed += 1;
            }
        }
        tracing::info!("Cleared {} cached renders under '{}'", removed, prefix);
        Ok(removed)
    }

    fn resolve_layout(&self, descriptor: &ComponentDescriptor, params: &Params) -> Option<Layout> {
        let requested = params
            .get("layout")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());

        let name = match (requested, &descriptor.layout) {
            (Some(name), _) => name.to_string(),
            (None, Some(LayoutRef::Name(name))) => name.clone(),
            (None, Some(LayoutRef::Inline(inline))) => {
                return Some(Layout::from_value(None, &Value::Object(inline.clone())))
            }
            (None, None) => return None,
        };

        let Some(key) = self
            .extras
            .resolve_key(ExtraGroup::Layouts, &descriptor.name, &name)
        else {
            tracing::debug!("Layout '{}' of '{}' not found", name, descriptor.name);
            return None;
        };
        self.extras
            .load(ExtraGroup::Layouts, &key)
            .map(|extra| Layout::from_value(Some(key), &extra.data))
    }

    pub fn load_extra(&self, group: ExtraGroup, key: &str) -> Option<Arc<Extra>> {
        self.extras.load(group, key)
    }

    /// Template path of a component variant: `<name>.template-<variant>`,
    /// then `<name>.<variant>`, then the main template.
    pub fn template_for(&self, name: &str, variant: Option<&str>) -> Option<PathBuf> {
        let descriptor = self.get(name)?;

        if let Some(variant) = variant.filter(|v| !v.is_empty()) {
            for candidate in [format!("template-{}", variant), variant.to_string()] {
                let key = format!("{}.{}", name, candidate);
                if let Some(path) = self
                    .extras
                    .load(ExtraGroup::Templates, &key)
                    .and_then(|extra| extra.data.as_str().map(PathBuf::from))
                {
                    return Some(path);
                }
            }
        }

        Some(descriptor.template.clone())
    }

    /// Reshape a field-set taken from the extras store or given inline.
    ///
    /// `None` when the key is unknown.
    pub fn load_component_fields(
        &self,
        source: FieldsSource,
        options: &FieldOptions,
    ) -> Option<Value> {
        let fieldset = match source {
            FieldsSource::Inline(value) => value,
            FieldsSource::Key(key) => {
                let key = self.fields_key(&key)?;
                self.extras.load(ExtraGroup::Fields, &key)?.data.clone()
            }
        };
        Some(shape_fields(&fieldset, options))
    }

    /// Reshaped and localized field-set, served from the derived field cache
    /// while it is at least as new as everything watched.
    pub fn resolved_fields(
        &self,
        key: &str,
        options: &FieldOptions,
    ) -> Result<Value, ComponentError> {
        let key = self
            .fields_key(key)
            .ok_or_else(|| ComponentError::NotFound(format!("fields '{}'", key)))?;
        let extra = self
            .extras
            .load(ExtraGroup::Fields, &key)
            .ok_or_else(|| ComponentError::NotFound(format!("fields '{}'", key)))?;

        if let Some(path) = extra.source.path() {
            self.watch(path);
        }

        let artifact = self
            .fields
            .artifact_path(&key, options, &self.config.locale);
        if let Some(value) = self.fields.fresh(&artifact, self.modified()) {
            tracing::debug!("Field cache hit {}", artifact.display());
            return Ok(value);
        }

        let source = match extra.source.path() {
            Some(path) => read_data_file(path)?,
            None => extra.data.clone(),
        };
        let mut value = shape_fields(&source, options);
        localize(&mut value, &self.config.locale);

        if let Err(e) = self.fields.store(&artifact, &value) {
            tracing::warn!("Cannot write field cache {}: {}", artifact.display(), e);
        }
        Ok(value)
    }

    fn fields_key(&self, key: &str) -> Option<String> {
        self.extras
            .resolve_key(ExtraGroup::Fields, SHARED_OWNER, key)
    }

    /// Add a timestamp, path, component name or list to the watched set.
    pub fn watch(&self, target: impl Into<WatchTarget>) {
        self.watcher.watch(target, self);
    }

    /// Latest modification time over everything watched.
    pub fn modified(&self) -> i64 {
        self.watcher.modified()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

/// A component's inventory: its own files, its definition and declared
/// files, and every template, layout and field-set it owns.
impl FileInventory for ComponentEngine {
    fn inventory(&self, component: &str) -> Option<Vec<PathBuf>> {
        let descriptor = self.get(component)?;

        let mut files = descriptor.files.clone();
        files.extend(descriptor.definition.clone());
        for group in ExtraGroup::ALL {
            for (_, source) in self.extras.owned(group, component) {
                files.extend(source.path().map(PathBuf::from));
            }
        }

        let mut seen = std::collections::HashSet::new();
        files.retain(|path| seen.insert(path.clone()));
        Some(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    /// Echoes the envelope so tests can assert on merged state without files.
    struct EchoRenderer;

    impl TemplateRenderer for EchoRenderer {
        fn render(
            &self,
            _template: &Path,
            envelope: &RenderEnvelope,
            engine: &ComponentEngine,
        ) -> Result<String, ComponentError> {
            let children = engine.render_children(&envelope.children, envelope)?;
            Ok(format!(
                "[{} {}]{}",
                envelope.name,
                Value::Object(envelope.params.clone()),
                children
            ))
        }
    }

    /// Includes the component it renders by name, from inside the renderer.
    struct IncludeRenderer;

    impl TemplateRenderer for IncludeRenderer {
        fn render(
            &self,
            _template: &Path,
            envelope: &RenderEnvelope,
            engine: &ComponentEngine,
        ) -> Result<String, ComponentError> {
            let inner = engine.render(envelope.name.as_str(), RenderRequest::new())?;
            Ok(format!("<{}>{}", envelope.chain.len(), inner))
        }
    }

    /// Fails for the component named `broken`.
    struct BrokenRenderer;

    impl TemplateRenderer for BrokenRenderer {
        fn render(
            &self,
            _template: &Path,
            envelope: &RenderEnvelope,
            engine: &ComponentEngine,
        ) -> Result<String, ComponentError> {
            if envelope.name == "broken" {
                return Err(ComponentError::Render("no template".to_string()));
            }
            let children = engine.render_children(&envelope.children, envelope)?;
            Ok(format!("<{}>{}</{}>", envelope.name, children, envelope.name))
        }
    }

    #[derive(Default)]
    struct FailingStore {
        calls: Mutex<usize>,
    }

    impl CacheStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, ComponentError> {
            *self.calls.lock().unwrap() += 1;
            Err(ComponentError::Cache("offline".to_string()))
        }

        fn set(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), ComponentError> {
            *self.calls.lock().unwrap() += 1;
            Err(ComponentError::Cache("offline".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<bool, ComponentError> {
            Ok(false)
        }

        fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, ComponentError> {
            Ok(Vec::new())
        }
    }

    fn engine() -> ComponentEngine {
        ComponentEngine::builder(EngineConfig::default())
            .renderer(EchoRenderer)
            .build()
    }

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_component_renders_empty() {
        let engine = engine();
        assert_eq!(engine.render("missing", RenderRequest::new()).unwrap(), "");
        assert!(engine.load("missing", &RenderRequest::new()).is_none());
    }

    #[test]
    fn test_load_runs_merge_stages() {
        let engine = engine();
        let mut card = ComponentDescriptor::named("card");
        card.params = params(json!({"title": "", "style": "default"}));
        engine.register(card);

        let context = engine
            .load("card", &RenderRequest::new().param("title", "Hi"))
            .unwrap();
        assert_eq!(context.stage(), Stage::AttrsBuilt);
        assert_eq!(context.params["title"], json!("Hi"));
        assert_eq!(context.params["style"], json!("default"));
        assert!(context.attrs.id().starts_with("card-"));
    }

    #[test]
    fn test_inline_layout_precedence() {
        let engine = engine();
        let mut card = ComponentDescriptor::named("card");
        card.params = params(json!({"a": "default", "b": "default", "c": "default"}));
        card.layout = Some(LayoutRef::Inline(params(json!({
            "params": {"b": "layout", "c": "layout"},
            "attrs": {"class": "from-layout", "role": "layout"}
        }))));
        engine.register(card);

        let context = engine
            .load(
                "card",
                &RenderRequest::new()
                    .param("c", "caller")
                    .attr("class", "from-caller")
                    .attr("role", "caller"),
            )
            .unwrap();

        assert_eq!(context.params["a"], json!("default"));
        assert_eq!(context.params["b"], json!("layout"));
        assert_eq!(context.params["c"], json!("caller"));
        assert_eq!(context.attrs.get("class"), Some(&json!(["from-layout", "from-caller"])));
        assert_eq!(context.attrs.get("role"), Some(&json!("caller")));
    }

    #[test]
    fn test_descriptor_target_skips_registry() {
        let engine = engine();
        let mut inline = ComponentDescriptor::named("inline");
        inline.params = params(json!({"x": 1}));

        let output = engine.render(inline, RenderRequest::new().param("y", 2)).unwrap();
        assert_eq!(output, "[inline {\"x\":1,\"y\":2}]");
    }

    #[test]
    fn test_transform_guard_and_output() {
        let engine = engine();
        let mut heading = ComponentDescriptor::named("heading");
        heading.params = params(json!({"content": ""}));
        heading.transform = Some(Computed::function(|scope: &Scope<'_>| {
            let mut params = scope.params.clone();
            params.insert("seen".to_string(), json!(true));
            params
        }));
        heading.render = Some(Computed::function(|scope: &Scope<'_>| {
            scope.params["content"].as_str().map(|c| !c.is_empty()).unwrap_or(false)
        }));
        heading.output = Some(Computed::Literal("<h1>{output}</h1>".to_string()));
        engine.register(heading);

        assert_eq!(engine.render("heading", RenderRequest::new()).unwrap(), "");
        assert_eq!(
            engine
                .render("heading", RenderRequest::new().param("content", "Hi"))
                .unwrap(),
            "<h1>[heading {\"content\":\"Hi\",\"seen\":true}]</h1>"
        );
    }

    #[test]
    fn test_children_inherit_layout_item() {
        let engine = engine();
        let mut badge = ComponentDescriptor::named("badge");
        badge.params = params(json!({"size": "default", "tone": "default"}));
        engine.register(badge);

        let mut grid = ComponentDescriptor::named("grid");
        grid.layout = Some(LayoutRef::Inline(params(json!({
            "item": {"params": {"size": "small", "tone": "muted"}}
        }))));
        grid.children = Child::list_from_value(&json!([
            "<hr>",
            {"component": "badge", "params": {"tone": "loud"}}
        ]));
        engine.register(grid);

        let output = engine.render("grid", RenderRequest::new()).unwrap();
        assert_eq!(
            output,
            "[grid {}]<hr>[badge {\"size\":\"small\",\"tone\":\"loud\"}]"
        );
    }

    #[test]
    fn test_children_from_params() {
        let engine = engine();
        engine.register(ComponentDescriptor::named("list"));
        let output = engine
            .render(
                "list",
                RenderRequest::new().param("children", json!(["a", "b"])),
            )
            .unwrap();
        assert!(output.ends_with("ab"));
    }

    #[test]
    fn test_self_inclusion_is_cycle_error() {
        let config = EngineConfig {
            max_depth: 5,
            ..Default::default()
        };
        let engine = ComponentEngine::builder(config).renderer(EchoRenderer).build();
        let mut looped = ComponentDescriptor::named("loop");
        looped.children = Child::list_from_value(&json!([{"component": "loop"}]));
        engine.register(looped);

        match engine.render("loop", RenderRequest::new()) {
            Err(ComponentError::Cycle { chain }) => {
                assert_eq!(chain.len(), 6);
                assert!(chain.iter().all(|name| name == "loop"));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_reentrant_render_is_bounded() {
        let config = EngineConfig {
            max_depth: 5,
            ..Default::default()
        };
        let engine = ComponentEngine::builder(config).renderer(IncludeRenderer).build();
        engine.register(ComponentDescriptor::named("echo"));

        match engine.render("echo", RenderRequest::new()) {
            Err(ComponentError::Cycle { chain }) => {
                assert_eq!(chain.len(), 6);
                assert!(chain.iter().all(|name| name == "echo"));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }

        // the chain is released once the render returns
        assert!(engine.active.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_child_renders_empty() {
        let engine = ComponentEngine::builder(EngineConfig::default())
            .renderer(BrokenRenderer)
            .build();
        engine.register(ComponentDescriptor::named("broken"));
        let mut page = ComponentDescriptor::named("page");
        page.children = Child::list_from_value(&json!([
            "ok",
            {"component": "broken"},
            "!"
        ]));
        engine.register(page);

        assert_eq!(engine.render("page", RenderRequest::new()).unwrap(), "<page>ok!</page>");
        assert!(matches!(
            engine.render("broken", RenderRequest::new()),
            Err(ComponentError::Render(_))
        ));
    }

    #[test]
    fn test_cache_store_failure_falls_back() {
        let store = Arc::new(FailingStore::default());
        let engine = ComponentEngine::builder(EngineConfig::default())
            .renderer(EchoRenderer)
            .cache_store(store.clone())
            .build();
        engine.register(ComponentDescriptor::named("card"));

        let output = engine
            .render("card", RenderRequest::new().cache("front", 60))
            .unwrap();
        assert_eq!(output, "[card {}]");
        assert_eq!(*store.calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_cache_policy() {
        let engine = ComponentEngine::builder(EngineConfig {
            debug: true,
            ..Default::default()
        })
        .build();
        assert!(engine.is_cacheable(false));
        assert!(!engine.is_cacheable(true));
    }
}
