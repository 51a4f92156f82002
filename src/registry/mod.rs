//! Component registry: discovery of component directories and lazy loading of
//! their definitions.
//!
//! A directory `<root>/<name>/templates/template.<ext>` makes `<name>` a
//! component. Roots are scanned in order and a later root replaces an earlier
//! component of the same name, so a site can override a base component by
//! shipping its own directory.

mod definition;
mod descriptor;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

pub use definition::{
    definition_from_map, find_definition, load_definition, read_data_file, Definition, Provider,
    DEFINITION_FILES,
};
pub use descriptor::{
    Capabilities, Child, ChildComponent, ComponentDescriptor, ComputeFn, Computed, HelperFn,
    LayoutRef, Scope,
};

use crate::error::ComponentError;
use crate::lister::{pattern_in, DirectoryLister};
use crate::plugins::PluginRegistry;

/// Registry of discovered components.
#[derive(Debug, Default)]
pub struct Registry {
    skeletons: RwLock<IndexMap<String, ComponentDescriptor>>,
    loaded: RwLock<HashMap<String, Arc<ComponentDescriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan roots for component directories and register their skeletons.
    ///
    /// Returns the names registered, in discovery order.
    pub fn discover(&self, roots: &[PathBuf], lister: &dyn DirectoryLister) -> Vec<String> {
        let mut discovered = Vec::new();

        for root in roots {
            for template in lister.list(&pattern_in(root, "*/templates/template.*")) {
                if !template.is_file() {
                    continue;
                }
                let Some(directory) = template.parent().and_then(Path::parent) else {
                    continue;
                };
                let Some(name) = directory.file_name().map(|n| n.to_string_lossy().to_string())
                else {
                    continue;
                };

                let mut skeleton =
                    ComponentDescriptor::skeleton(&name, directory.to_path_buf(), template.clone());
                skeleton.definition = find_definition(directory);
                skeleton.files = lister
                    .list(&pattern_in(directory, "**/*"))
                    .into_iter()
                    .filter(|path| path.is_file())
                    .collect();

                tracing::debug!("Discovered component '{}' in {}", name, directory.display());
                self.register(skeleton);
                discovered.push(name);
            }
        }

        discovered
    }

    /// Register (or override) a skeleton. Drops any memoized descriptor of the
    /// same name.
    pub fn register(&self, skeleton: ComponentDescriptor) {
        let name = skeleton.name.clone();
        let replaced = self
            .skeletons
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone(), skeleton);

        if replaced.is_some() {
            tracing::debug!("Component '{}' overridden", name);
            self.loaded
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&name);
        }
    }

    /// Resolved descriptor by name, loading its definition on first access.
    ///
    /// Unknown names yield `None`. A definition that cannot be loaded leaves
    /// the skeleton in place.
    pub fn get(&self, name: &str, plugins: &PluginRegistry) -> Option<Arc<ComponentDescriptor>> {
        if let Some(found) = self
            .loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Some(Arc::clone(found));
        }

        let mut descriptor = self.skeleton(name)?;

        match self.provider_for(&descriptor, plugins) {
            Ok(Some(provider)) => match provider.resolve(plugins) {
                Ok(definition) => definition.apply(&mut descriptor),
                Err(e) => tracing::warn!("Using skeleton of '{}': {}", name, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Using skeleton of '{}': {}", name, e),
        }

        let descriptor = Arc::new(descriptor);
        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        Some(Arc::clone(
            loaded
                .entry(name.to_string())
                .or_insert_with(|| Arc::clone(&descriptor)),
        ))
    }

    /// The definition source of a component: a factory registered under its
    /// name takes precedence over a definition file.
    fn provider_for(
        &self,
        descriptor: &ComponentDescriptor,
        plugins: &PluginRegistry,
    ) -> Result<Option<Provider>, ComponentError> {
        if plugins.has_factory(&descriptor.name) {
            return Ok(Some(Provider::Lazy(descriptor.name.clone())));
        }
        match &descriptor.definition {
            Some(path) => load_definition(path, plugins).map(Some),
            None => Ok(None),
        }
    }

    /// Discovered (unloaded) skeleton.
    pub fn skeleton(&self, name: &str) -> Option<ComponentDescriptor> {
        self.skeletons
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skeletons
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Component names in discovery order.
    pub fn names(&self) -> Vec<String> {
        self.skeletons
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Component directories by name, in discovery order.
    pub fn directories(&self) -> Vec<(String, PathBuf)> {
        self.skeletons
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, skeleton)| (name.clone(), skeleton.directory.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lister::GlobLister;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn component(root: &Path, name: &str, template: &str, definition: Option<&str>) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(dir.join("templates/template.html"), template).unwrap();
        if let Some(definition) = definition {
            fs::write(dir.join("component.yaml"), definition).unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_and_override() {
        let base = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        component(base.path(), "card", "<div>base</div>", None);
        component(base.path(), "badge", "<span></span>", None);
        let site_card = component(site.path(), "card", "<div>site</div>", None);
        fs::create_dir_all(base.path().join("notes")).unwrap();

        let registry = Registry::new();
        let found = registry.discover(
            &[base.path().to_path_buf(), site.path().to_path_buf()],
            &GlobLister,
        );

        assert_eq!(found.len(), 3);
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["badge".to_string(), "card".to_string()]);

        let card = registry.get("card", &PluginRegistry::new()).unwrap();
        assert_eq!(card.directory, site_card);
        assert_eq!(card.title, "card");
        assert_eq!(card.files, vec![site_card.join("templates/template.html")]);
    }

    #[test]
    fn test_get_loads_definition_once() {
        let root = TempDir::new().unwrap();
        let dir = component(
            root.path(),
            "heading",
            "<h1></h1>",
            Some("title: Heading\nparams:\n  tag: h1\n"),
        );

        let registry = Registry::new();
        registry.discover(&[root.path().to_path_buf()], &GlobLister);
        let plugins = PluginRegistry::new();

        let first = registry.get("heading", &plugins).unwrap();
        assert_eq!(first.title, "Heading");
        assert_eq!(first.params["tag"], json!("h1"));
        assert_eq!(first.definition, Some(dir.join("component.yaml")));

        fs::write(dir.join("component.yaml"), "title: Changed\n").unwrap();
        let second = registry.get("heading", &plugins).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_component_is_none() {
        let registry = Registry::new();
        assert!(registry.get("missing", &PluginRegistry::new()).is_none());
    }

    #[test]
    fn test_malformed_definition_keeps_skeleton() {
        let root = TempDir::new().unwrap();
        component(root.path(), "broken", "<p></p>", Some("- just\n- a list\n"));

        let registry = Registry::new();
        registry.discover(&[root.path().to_path_buf()], &GlobLister);

        let broken = registry.get("broken", &PluginRegistry::new()).unwrap();
        assert_eq!(broken.title, "broken");
        assert!(broken.params.is_empty());
    }

    #[test]
    fn test_registered_factory_wins() {
        let registry = Registry::new();
        registry.register(ComponentDescriptor::named("alert"));

        let mut plugins = PluginRegistry::new();
        plugins.register_factory("alert", || Definition::new().title("Alert").param("style", "primary"));

        let alert = registry.get("alert", &plugins).unwrap();
        assert_eq!(alert.title, "Alert");
        assert_eq!(alert.params["style"], json!("primary"));
    }
}
