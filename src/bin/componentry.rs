//! componentry CLI - discover, render and inspect template components
//!
//! Uses the built-in placeholder renderer and an in-memory cache store.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use componentry::value::parse_pairs;
use componentry::{
    Attributes, ComponentEngine, EngineConfig, ExpressionEngine, FieldOptions, RenderRequest,
    WatchTarget,
};

#[derive(Parser)]
#[command(name = "componentry")]
#[command(version, about = "Directory-scoped template components", long_about = None)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Component root; repeatable, later roots override earlier ones
    #[arg(short, long = "root", global = true)]
    roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered components and their directories
    List,

    /// Render a component
    Render {
        /// Component name
        name: String,

        /// Param as key=value (value parsed as JSON when possible)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Attribute as key=value
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
    },

    /// Evaluate an attribute expression
    Expr {
        expression: String,

        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Print the latest modification time of components, paths or timestamps
    Modified {
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Resolve a field-set through the field cache
    Fields {
        /// Field-set key, `<owner>.<name>` or a shared name
        key: String,

        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long)]
        exclude: Vec<String>,

        #[arg(long)]
        include: Vec<String>,
    },
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config, cli.roots).and_then(|config| match cli.command {
        Commands::List => list_components(config),
        Commands::Render { name, params, attrs } => render_component(config, name, params, attrs),
        Commands::Expr { expression, params } => evaluate_expression(expression, params),
        Commands::Modified { targets } => print_modified(config, targets),
        Commands::Fields {
            key,
            prefix,
            exclude,
            include,
        } => resolve_fields(config, key, prefix, exclude, include),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>, roots: Vec<PathBuf>) -> Result<EngineConfig, String> {
    let config = match path {
        Some(path) => EngineConfig::load_from_file(&path).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };
    Ok(config.with_roots(roots).apply_env())
}

fn engine(config: EngineConfig) -> ComponentEngine {
    let engine = ComponentEngine::builder(config).build();
    engine.discover();
    engine
}

fn list_components(config: EngineConfig) -> Result<(), String> {
    let engine = engine(config);
    let components = engine.registry().directories();
    if components.is_empty() {
        println!("No components found");
        return Ok(());
    }
    for (name, directory) in components {
        println!("{}\t{}", name, directory.display());
    }
    Ok(())
}

fn render_component(
    config: EngineConfig,
    name: String,
    params: Vec<String>,
    attrs: Vec<String>,
) -> Result<(), String> {
    let engine = engine(config);
    if !engine.registry().contains(&name) {
        return Err(format!("Component not found: {}", name));
    }

    let request = RenderRequest::new()
        .params(parse_pairs(&params)?)
        .attrs(Attributes::from_params(&parse_pairs(&attrs)?));
    let output = engine.render(name.as_str(), request).map_err(|e| e.to_string())?;
    println!("{}", output);
    Ok(())
}

fn evaluate_expression(expression: String, params: Vec<String>) -> Result<(), String> {
    let params = parse_pairs(&params)?;
    println!("{}", ExpressionEngine::new().evaluate(&expression, &params));
    Ok(())
}

fn print_modified(config: EngineConfig, targets: Vec<String>) -> Result<(), String> {
    let engine = engine(config);
    let targets: Vec<WatchTarget> = targets
        .into_iter()
        .map(|target| match target.parse::<i64>() {
            Ok(timestamp) => WatchTarget::Timestamp(timestamp),
            Err(_) => WatchTarget::from(target),
        })
        .collect();
    engine.watch(targets);

    let modified = engine.modified();
    let time = DateTime::<Utc>::from_timestamp(modified, 0)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!("{}\t{}", modified, time);
    Ok(())
}

fn resolve_fields(
    config: EngineConfig,
    key: String,
    prefix: String,
    exclude: Vec<String>,
    include: Vec<String>,
) -> Result<(), String> {
    let engine = engine(config);
    let options = FieldOptions {
        prefix,
        exclude,
        include,
        ..Default::default()
    };
    let fields: Value = engine
        .resolved_fields(&key, &options)
        .map_err(|e| e.to_string())?;
    let pretty = serde_json::to_string_pretty(&fields).map_err(|e| e.to_string())?;
    println!("{}", pretty);
    Ok(())
}
