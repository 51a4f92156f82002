//! Attribute sets and the attribute builder.
//!
//! An [`Attributes`] set is an ordered name → value map in which `class` is
//! always list-valued. [`build`] turns caller-supplied attributes into the
//! final set for one render: it guarantees an `id`, normalises `class`, and
//! applies the descriptor's own attribute declaration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::expression::ExpressionEngine;
use crate::html;
use crate::registry::{Computed, ComponentDescriptor, Scope};
use crate::value::{to_text, Params};

/// Ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON map, normalising `class`.
    pub fn from_params(map: &Params) -> Self {
        let mut attrs = Self(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        attrs.normalize_class();
        attrs
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.0.insert(name.clone(), value.into());
        if name == "class" {
            self.normalize_class();
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// The `id` attribute as text, empty when absent.
    pub fn id(&self) -> String {
        self.0.get("id").map(to_text).unwrap_or_default()
    }

    /// The `class` list (entries may still be expressions).
    pub fn classes(&self) -> &[Value] {
        match self.0.get("class") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn add_class(&mut self, class: impl Into<Value>) -> &mut Self {
        self.normalize_class();
        if let Some(Value::Array(items)) = self.0.get_mut("class") {
            items.push(class.into());
        }
        self
    }

    /// `class` becomes a list: absent → `[]`, scalar → `[scalar]`.
    ///
    /// A map-valued class (`expression => condition`) is wrapped as one item.
    pub fn normalize_class(&mut self) {
        let normalized = match self.0.get("class") {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(Value::Array(_)) => return,
            Some(Value::String(s)) if s.is_empty() => Value::Array(Vec::new()),
            Some(other) => Value::Array(vec![other.clone()]),
        };
        self.0.insert("class".to_string(), normalized);
    }

    /// Merge a declared attribute map over this set.
    ///
    /// Scalar keys are replaced; `class` lists are concatenated.
    pub fn merge_over(&mut self, declared: &Attributes) {
        for (key, value) in &declared.0 {
            if key == "class" {
                let extra = match value {
                    Value::Array(items) => items.clone(),
                    Value::Null => Vec::new(),
                    other => vec![other.clone()],
                };
                self.normalize_class();
                if let Some(Value::Array(items)) = self.0.get_mut("class") {
                    items.extend(extra);
                }
            } else {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge this set over `base`: keys here win, `class` lists concatenate
    /// with `base` entries first.
    pub fn merged_under(&self, base: &Attributes) -> Attributes {
        let mut merged = base.clone();
        merged.merge_over(self);
        merged
    }

    /// Serialize as an attribute string, evaluating list values against `params`.
    pub fn render(&self, engine: &ExpressionEngine, params: &Params) -> String {
        html::attributes(engine, &self.0, params)
    }

    pub fn to_params(&self) -> Params {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl From<Params> for Attributes {
    fn from(map: Params) -> Self {
        Attributes::from_params(&map)
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Generate a unique id for a component: `lowercase(name + '-' + suffix)`.
pub fn generate_id(name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", name, &suffix[..12]).to_lowercase()
}

/// Build the final attribute set for one render.
///
/// A computed attrs declaration receives the normalised supplied set and its
/// return value replaces it entirely; a literal declaration is merged over the
/// supplied set.
pub fn build(supplied: &Attributes, descriptor: &ComponentDescriptor, params: &Params) -> Attributes {
    let mut attrs = supplied.clone();

    if attrs.id().is_empty() {
        attrs.set("id", generate_id(&descriptor.name));
    }
    attrs.normalize_class();

    match &descriptor.attrs {
        Some(Computed::Literal(declared)) => attrs.merge_over(declared),
        Some(Computed::Function(compute)) => {
            let mut computed = compute(&Scope::new(descriptor, params, &attrs));
            computed.normalize_class();
            attrs = computed;
        }
        None => {}
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn attrs(value: Value) -> Attributes {
        Attributes::from_params(value.as_object().unwrap())
    }

    #[test]
    fn test_class_is_always_a_list() {
        assert_eq!(attrs(json!({})).classes().len(), 0);
        assert_eq!(attrs(json!({"class": "a"})).classes(), &[json!("a")]);
        assert_eq!(attrs(json!({"class": ["a", "b"]})).classes().len(), 2);

        let mut set = Attributes::new();
        set.set("class", "solo");
        assert_eq!(set.get("class"), Some(&json!(["solo"])));
    }

    #[test]
    fn test_build_generates_distinct_ids() {
        let descriptor = ComponentDescriptor::named("Card");
        let first = build(&Attributes::new(), &descriptor, &Params::new());
        let second = build(&Attributes::new(), &descriptor, &Params::new());

        assert!(first.id().starts_with("card-"));
        assert_ne!(first.id(), second.id());
        assert_eq!(first.get("class"), Some(&json!([])));
    }

    #[test]
    fn test_build_keeps_supplied_id() {
        let descriptor = ComponentDescriptor::named("card");
        let built = build(&attrs(json!({"id": "main"})), &descriptor, &Params::new());
        assert_eq!(built.id(), "main");
    }

    #[test]
    fn test_literal_declaration_concatenates_class() {
        let mut descriptor = ComponentDescriptor::named("card");
        descriptor.attrs = Some(Computed::Literal(attrs(json!({
            "class": ["uk-card"],
            "role": "region"
        }))));

        let built = build(
            &attrs(json!({"class": "mine", "role": "note"})),
            &descriptor,
            &Params::new(),
        );

        assert_eq!(built.get("class"), Some(&json!(["mine", "uk-card"])));
        assert_eq!(built.get("role"), Some(&json!("region")));
    }

    #[test]
    fn test_computed_declaration_replaces_set() {
        let mut descriptor = ComponentDescriptor::named("card");
        descriptor.attrs = Some(Computed::Function(Arc::new(|scope: &Scope<'_>| {
            let mut attrs = Attributes::new();
            attrs.set("id", scope.attrs.id());
            attrs.set("data-title", scope.params.get("title").cloned().unwrap_or(Value::Null));
            attrs
        })));

        let params = json!({"title": "Hi"}).as_object().cloned().unwrap();
        let built = build(&attrs(json!({"id": "x", "role": "note"})), &descriptor, &params);

        assert_eq!(built.id(), "x");
        assert_eq!(built.get("data-title"), Some(&json!("Hi")));
        assert!(!built.contains("role"));
        assert_eq!(built.get("class"), Some(&json!([])));
    }

    #[test]
    fn test_render_serializes_expressions() {
        let engine = ExpressionEngine::new();
        let mut set = attrs(json!({"id": "c1", "class": ["uk-card", "uk-card-{style}"]}));
        set.add_class("extra");
        let params = json!({"style": "primary"}).as_object().cloned().unwrap();
        assert_eq!(
            set.render(&engine, &params),
            " id=\"c1\" class=\"uk-card uk-card-primary extra\""
        );
    }
}
