use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use cml_analyzer::model::Model;
use cml_common::manifest::{self, ManifestError};
use cml_common::{AnalyzerConfig, Callable, Diagnostic, NodeRef, TernaryPolicy};

/// Context Mapper semantic checker.
///
/// Reads a linked CML model graph (JSON) and reports semantic errors and
/// warnings.
#[derive(Parser)]
#[command(
    name = "cmlc",
    version,
    about,
    long_about = "Context Mapper semantic checker.\n\nReads a linked CML model graph (JSON) and validates aggregates, entity\nmappings, anti-corruption declarations, context maps, constructors and\ninvariant expressions.\n\nExamples:\n  cmlc model.json                     Check with Cml.toml settings\n  cmlc model.json --ternary matching  Override the ternary branch rule\n  cmlc model.json --format json       Print diagnostics as JSON"
)]
struct Cli {
    /// Linked model graph (JSON).
    model: PathBuf,

    /// Cml.toml to use instead of searching upwards from the model file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ternary branch rule: boolean or matching.
    #[arg(long)]
    ternary: Option<TernaryPolicy>,

    /// Check aggregates in parallel.
    #[arg(long)]
    parallel: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Suppress warning output.
    #[arg(short, long)]
    quiet: bool,

    /// Log analyzer progress to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let model = match Model::load(&cli.model) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: could not load '{}': {}", cli.model.display(), e);
            process::exit(1);
        }
    };

    let mut config = load_config(&cli);
    if let Some(policy) = cli.ternary {
        config.ternary_branches = policy;
    }
    if cli.parallel {
        config.parallel = true;
    }
    debug!(?config, "effective configuration");

    let bag = cml_analyzer::analyze(&model, &config);
    let has_errors = bag.has_errors();
    let shown: Vec<Diagnostic> = bag
        .into_diagnostics()
        .into_iter()
        .filter(|d| d.is_error() || !cli.quiet)
        .collect();

    match cli.format {
        Format::Json => match serde_json::to_string_pretty(&shown) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize diagnostics: {}", e);
                process::exit(1);
            }
        },
        Format::Text => {
            for diag in &shown {
                print_diagnostic(&model, diag);
            }
            if !has_errors {
                println!("No errors found.");
            }
        }
    }

    if has_errors {
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// `--config` if given, else the nearest Cml.toml above the model file,
/// else defaults.
fn load_config(cli: &Cli) -> AnalyzerConfig {
    let loaded = match &cli.config {
        Some(path) => manifest::load_manifest(path),
        None => {
            let abs = std::fs::canonicalize(&cli.model).unwrap_or_else(|_| cli.model.clone());
            manifest::find_and_load_manifest(&abs)
        }
    };
    match loaded {
        Ok(m) => {
            debug!(root = %m.root_dir.display(), "loaded Cml.toml");
            m.analysis
        }
        Err(ManifestError::NotFound(dir)) => {
            debug!(%dir, "no Cml.toml, using defaults");
            AnalyzerConfig::default()
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn print_diagnostic(model: &Model, diag: &Diagnostic) {
    println!("{}", diag);
    if let Some(location) = diag.location {
        let index = location
            .index
            .map(|i| format!("[{}]", i))
            .unwrap_or_default();
        println!(
            "  --> {} ({}{})",
            describe(model, location.node),
            location.feature,
            index
        );
    }
    if let Some(suggestion) = &diag.suggestion {
        println!("  = help: {}", suggestion);
    }
}

/// Human-readable name of a node for text output.
fn describe(model: &Model, node: NodeRef) -> String {
    let exists = |index: usize, len: usize| index < len;
    match node {
        NodeRef::Context { id } if exists(id.index(), model.contexts.len()) => {
            format!("bounded context '{}'", model[id].name)
        }
        NodeRef::ContextMap { id } if exists(id.index(), model.context_maps.len()) => {
            format!("context map '{}'", model[id].name)
        }
        NodeRef::Relationship { id } => format!("relationship {}", id),
        NodeRef::Aggregate { id } if exists(id.index(), model.aggregates.len()) => {
            format!("aggregate '{}'", model[id].name)
        }
        NodeRef::DomainObject { id } if exists(id.index(), model.objects.len()) => {
            format!("{} '{}'", model[id].kind_name(), model[id].name)
        }
        NodeRef::Attribute { id } if exists(id.index(), model.attributes.len()) => {
            let attribute = &model[id];
            format!("attribute '{}.{}'", model[attribute.owner].name, attribute.name)
        }
        NodeRef::AntiCorruption { id } if exists(id.index(), model.anti_corruptions.len()) => {
            format!("anti-corruption '{}'", model[id].name)
        }
        NodeRef::AttributeTranslation { owner, index } => {
            format!("attribute #{} of {}", index, describe(model, NodeRef::AntiCorruption { id: owner }))
        }
        NodeRef::InterInvariant { owner, index } => {
            format!("invariant #{} of {}", index, describe(model, NodeRef::AntiCorruption { id: owner }))
        }
        NodeRef::IntraInvariant { aggregate, index } => {
            format!("invariant #{} of {}", index, describe(model, NodeRef::Aggregate { id: aggregate }))
        }
        NodeRef::EntityMapping { entity } => {
            format!("mapping of {}", describe(model, NodeRef::DomainObject { id: entity }))
        }
        NodeRef::AliasDeclaration { entity, index } => format!(
            "alias #{} of {}",
            index,
            describe(model, NodeRef::DomainObject { id: entity })
        ),
        NodeRef::AttributeMapping { entity, index } => format!(
            "mapped attribute #{} of {}",
            index,
            describe(model, NodeRef::DomainObject { id: entity })
        ),
        NodeRef::Callable { callable } => describe_callable(model, callable),
        NodeRef::Parameter { callable, index } => {
            format!("parameter #{} of {}", index, describe_callable(model, callable))
        }
        NodeRef::Assignment { callable, index } => {
            format!("assignment #{} of {}", index, describe_callable(model, callable))
        }
        NodeRef::Expr { id } => format!("expression {}", id),
        other => {
            warn!(?other, "diagnostic points outside the model");
            format!("{:?}", other)
        }
    }
}

fn describe_callable(model: &Model, callable: Callable) -> String {
    match callable {
        Callable::Constructor { object } => format!(
            "constructor of {}",
            describe(model, NodeRef::DomainObject { id: object })
        ),
        Callable::Operation { object, index } => format!(
            "operation #{} of {}",
            index,
            describe(model, NodeRef::DomainObject { id: object })
        ),
    }
}
