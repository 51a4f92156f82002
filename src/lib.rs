//! # Componentry: Directory-Scoped Template Components
//!
//! Componentry renders reusable page fragments ("components") that live in
//! their own directories, each with a template, optional definition file,
//! layouts, template variants and field-sets.
//!
//! ## Features
//!
//! - **Component registry**: discovery across several roots, later roots override earlier ones
//! - **Merge pipeline**: defaults, layout and caller params merged in a fixed, tested order
//! - **Attribute expressions**: a small conditional grammar for computed HTML attribute values
//! - **Render caching**: per-component cache directives behind a pluggable cache store
//! - **Modification watcher**: one freshness value for invalidating derived caches
//! - **Plugin registry**: named Rust callables referenced from plain-data definitions
//!
//! ## Example: component definition
//!
//! ```yaml
//! # components/card/component.yaml
//! title: Card
//! params:
//!   title: ""
//!   style: default
//! attrs:
//!   class:
//!     - uk-card
//!     - uk-card-{style}
//!     - "[uk-card-{size:small|large}]"
//! cache:
//!   name: card
//!   expire: 3600
//! ```
//!
//! ```text
//! <!-- components/card/templates/template.html -->
//! <div{attrs}><h3>{title}</h3>{children}</div>
//! ```
//!
//! ## Example: rendering
//!
//! ```ignore
//! use componentry::{ComponentEngine, EngineConfig, RenderRequest};
//!
//! let config = EngineConfig::default().with_roots(["components".into()]);
//! let engine = ComponentEngine::builder(config).build();
//! engine.discover();
//!
//! let html = engine.render("card", RenderRequest::new().param("title", "Hi"))?;
//! ```

pub mod error;
pub mod value;
pub mod config;
pub mod plugins;

// Expression language and HTML serialization
pub mod expression;
pub mod html;
pub mod attributes;

// Discovery, definitions and extras
pub mod lister;
pub mod registry;
pub mod extras;
pub mod fields;

// Freshness, caching and metadata
pub mod watcher;
pub mod cache;
pub mod metadata;

// Rendering
pub mod renderer;
pub mod pipeline;

pub use error::ComponentError;
pub use value::Params;
pub use config::EngineConfig;
pub use plugins::{PluginKind, PluginRegistry};

pub use expression::{Expression, ExpressionEngine};
pub use attributes::{generate_id, Attributes};

pub use registry::{
    Capabilities, Child, ChildComponent, ComponentDescriptor, Computed, Definition, LayoutRef,
    Provider, Registry, Scope,
};
pub use extras::{Extra, ExtraGroup, ExtraSource, ExtrasStore, Layout, LayoutItem};
pub use fields::{FieldCache, FieldOptions};

pub use watcher::{FileInventory, WatchTarget, Watcher};
pub use cache::{CacheDirective, CacheStore, MemoryCacheStore};
pub use metadata::{MemoryMetadata, MetadataSink};

pub use renderer::{PlaceholderRenderer, TemplateRenderer};
pub use pipeline::{
    ComponentEngine, ComponentEngineBuilder, FieldsSource, RenderContext, RenderEnvelope,
    RenderRequest, RenderTarget, Stage,
};
