//! Annolith command line front end.
//!
//! Loads a JSON declaration model, builds annotation metadata for the selected
//! declarations and prints it as a JSON object keyed by qualified name.
//! Diagnostics go to stderr.
//!
//! Exit codes:
//! - `0` on success
//! - `1` when an error diagnostic was reported
//! - `2` when the model or config cannot be loaded

use std::path::PathBuf;

use annolith_builder::{
    BuildError, BuildOptions, BuilderConfig, ConfigError, DeclarationModel, Diagnostics,
    MemoryModel, MetadataBuilder, ModelError, Severity,
};
use annolith_types::{DeclId, name_matches_pattern};
use clap::Parser;
use log::{debug, info};

/// CLI arguments for the Annolith metadata builder
#[derive(Parser, Debug)]
#[command(name = "annolith")]
#[command(about = "Build annotation metadata for declarations of a JSON declaration model")]
struct Args {
    /// Path to the JSON declaration model
    #[arg(short, long)]
    model: PathBuf,

    /// Path to a JSON builder config (defaults apply to missing keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Qualified name pattern of declarations to build, e.g. `com.acme.**`
    /// or `com.acme.Service#*` (repeatable, defaults to every type)
    #[arg(short, long = "decl", value_name = "PATTERN")]
    decls: Vec<String>,

    /// Ignore ancestors, only report annotations declared on the declaration
    #[arg(long)]
    declared_only: bool,

    /// Let methods inherit the annotations of their declaring types
    #[arg(long)]
    inherit_type_annotations: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Failed to serialize metadata: {0}")]
    Output(#[from] serde_json::Error),
}

/// The result of a run: the JSON document and formatted diagnostics.
#[derive(Debug)]
struct Outcome {
    json: String,
    messages: Vec<String>,
    errors: usize,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Declarations whose qualified name matches any pattern, every type when
/// no pattern is given.
fn select_declarations(model: &MemoryModel, patterns: &[String]) -> Vec<DeclId> {
    model
        .ids()
        .filter(|&id| {
            if patterns.is_empty() {
                return model.is_type(id);
            }
            let name = model.qualified_name(id);
            patterns.iter().any(|p| name_matches_pattern(&name, p))
        })
        .collect()
}

fn run(args: &Args) -> Result<Outcome, CliError> {
    let model = MemoryModel::from_json_file(&args.model)?;
    info!("Loaded {} declarations from {:?}", model.len(), args.model);

    let config = match &args.config {
        Some(path) => BuilderConfig::from_json_file(path)?,
        None => BuilderConfig::default(),
    };
    let builder = MetadataBuilder::new(config);
    let options = BuildOptions {
        inherit_type_annotations: args.inherit_type_annotations,
        declared_only: args.declared_only,
    };

    let mut diagnostics = Diagnostics::new();
    let mut output = serde_json::Map::new();
    for id in select_declarations(&model, &args.decls) {
        let name = model.qualified_name(id);
        debug!("Building metadata for {}", name);
        let metadata = builder.build_with(&model, id, options, &mut diagnostics)?;
        output.insert(name, serde_json::to_value(&metadata)?);
    }

    let document = serde_json::Value::Object(output);
    let json = if args.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    let messages = diagnostics
        .iter()
        .map(|d| {
            let level = match d.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            format!("{}: {}: {}", level, model.qualified_name(d.declaration), d.message)
        })
        .collect();

    Ok(Outcome {
        json,
        messages,
        errors: diagnostics.errors().count(),
    })
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(outcome) => {
            println!("{}", outcome.json);
            for message in &outcome.messages {
                eprintln!("{}", message);
            }
            if outcome.errors > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("[annolith] Error: {}", e);
            std::process::exit(2);
        }
    }
}
