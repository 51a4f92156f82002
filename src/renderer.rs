//! Template renderer boundary and the built-in placeholder renderer.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::ComponentError;
use crate::html;
use crate::pipeline::{ComponentEngine, RenderEnvelope};
use crate::value::to_text;

/// Turns a template file plus a render envelope into text.
///
/// The engine handle gives access to child rendering and the expression
/// engine; a renderer must not interpret anything the envelope does not carry.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        template: &Path,
        envelope: &RenderEnvelope,
        engine: &ComponentEngine,
    ) -> Result<String, ComponentError>;
}

/// Substitutes `{token}` placeholders in the template file.
///
/// Tokens: `{attrs}` (serialized attributes with a leading space),
/// `{children}`, `{id}`, `{class}`, `{name}`, `{title}` and any param name.
/// `name` and `title` prefer a param of the same name. Values are inserted
/// verbatim; unknown tokens are left as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*)\}").expect("token pattern is valid")
});

impl PlaceholderRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render template source that is already in memory.
    pub fn render_source(
        &self,
        source: &str,
        envelope: &RenderEnvelope,
        engine: &ComponentEngine,
    ) -> Result<String, ComponentError> {
        let children = if source.contains("{children}") {
            engine.render_children(&envelope.children, envelope)?
        } else {
            String::new()
        };

        let expressions = engine.expressions();
        let params = &envelope.params;

        let rendered = TOKEN.replace_all(source, |caps: &Captures<'_>| {
            let token = &caps[1];
            match token {
                "attrs" => envelope.attrs.render(expressions, params),
                "children" => children.clone(),
                "id" => envelope.id(),
                "class" => html::expr(
                    expressions,
                    &Value::Array(envelope.attrs.classes().to_vec()),
                    params,
                )
                .unwrap_or_default(),
                _ => match params.get(token) {
                    Some(value) => to_text(value),
                    None if token == "name" => envelope.name.clone(),
                    None if token == "title" => envelope.title.clone(),
                    None => caps[0].to_string(),
                },
            }
        });

        Ok(rendered.into_owned())
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        template: &Path,
        envelope: &RenderEnvelope,
        engine: &ComponentEngine,
    ) -> Result<String, ComponentError> {
        let source = fs::read_to_string(template).map_err(|e| {
            ComponentError::Render(format!(
                "cannot read template {} of '{}': {}",
                template.display(),
                envelope.name,
                e
            ))
        })?;
        self.render_source(&source, envelope, engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::config::EngineConfig;
    use crate::registry::Child;
    use serde_json::json;
    use std::path::PathBuf;

    fn envelope() -> RenderEnvelope {
        let mut attrs = Attributes::new();
        attrs.set("id", "card-1");
        attrs.set("class", json!(["uk-card", "uk-card-{style}"]));

        RenderEnvelope {
            name: "card".to_string(),
            title: "Card".to_string(),
            template: PathBuf::new(),
            directory: PathBuf::new(),
            definition: None,
            parent: None,
            params: json!({"style": "primary", "count": 3}).as_object().cloned().unwrap(),
            attrs,
            children: vec![Child::Text("<p>a</p>".into()), Child::Text("<p>b</p>".into())],
            layout: None,
            functions: Default::default(),
            chain: vec!["card".to_string()],
        }
    }

    #[test]
    fn test_tokens() {
        let engine = ComponentEngine::builder(EngineConfig::default()).build();
        let renderer = PlaceholderRenderer::new();
        let output = renderer
            .render_source(
                "<div{attrs} data-n=\"{count}\">{title}|{name}|{id}|{class}|{children}|{unknown}</div>",
                &envelope(),
                &engine,
            )
            .unwrap();

        assert_eq!(
            output,
            "<div id=\"card-1\" class=\"uk-card uk-card-primary\" data-n=\"3\">Card|card|card-1|uk-card uk-card-primary|<p>a</p><p>b</p>|{unknown}</div>"
        );
    }

    #[test]
    fn test_token_pattern_is_shared() {
        assert_eq!(std::mem::size_of::<PlaceholderRenderer>(), 0);
        let engine = ComponentEngine::builder(EngineConfig::default()).build();
        let first = PlaceholderRenderer::new().render_source("{name}", &envelope(), &engine).unwrap();
        let second = PlaceholderRenderer::default().render_source("{title}", &envelope(), &engine).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("card", "Card"));
    }

    #[test]
    fn test_missing_template_is_render_error() {
        let engine = ComponentEngine::builder(EngineConfig::default()).build();
        let result = PlaceholderRenderer::new().render(Path::new("/nonexistent/template.html"), &envelope(), &engine);
        assert!(matches!(result, Err(ComponentError::Render(_))));
    }
}
