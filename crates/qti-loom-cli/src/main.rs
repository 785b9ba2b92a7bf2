use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qti_loom_config::Config;
use qti_loom_engine::processing::CandidateResponses;
use qti_loom_engine::{
    CodecRegistry, FeedbackCatalog, ItemScoring, ProcessingMode, SerializeOptions, parse,
    serialize_with,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "qti-loom")]
#[command(about = "Parse, round-trip and score QTI assessment items")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the editable tree and diagnostics as JSON
    Parse { file: PathBuf },

    /// Parse and serialize back against the original document
    Roundtrip {
        file: PathBuf,

        /// Switch the processing mode first (allCorrect, sumScores, custom)
        #[arg(long)]
        mode: Option<ProcessingMode>,

        /// Write the markup here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List feedback identifiers and stale feedback references
    Feedback { file: PathBuf },

    /// Evaluate response processing for candidate responses
    Score {
        file: PathBuf,

        /// Responses as ID=VALUE[,VALUE...]; an empty value list is NULL
        #[arg(value_parser = parse_response)]
        responses: Vec<(String, Vec<String>)>,
    },

    /// List the node types with a registered codec
    Codecs,

    /// Show the configuration, or update and save it
    Config {
        /// Directory relative item paths are looked up in
        #[arg(long)]
        items_path: Option<PathBuf>,

        /// Spaces per nesting level in regenerated markup
        #[arg(long)]
        indent: Option<usize>,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load()
        .context("Failed to load configuration")?
        .unwrap_or_default();

    match args.command {
        Command::Parse { file } => {
            let source = read_item(&config, &file)?;
            let output = parse(&source);
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Roundtrip { file, mode, output } => roundtrip(&config, &file, mode, output),
        Command::Feedback { file } => {
            let source = read_item(&config, &file)?;
            let doc = parse(&source).document;
            let catalog = FeedbackCatalog::build(&doc);
            for identifier in catalog.iter() {
                println!("{}\t{}", identifier.key, identifier.label);
            }
            for stale in catalog.stale_references(&doc) {
                eprintln!("stale feedback reference {} at {:?}", stale.identifier, stale.path.0);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Score { file, responses } => {
            let source = read_item(&config, &file)?;
            let scoring = ItemScoring::from_markup(&source)?;
            let mut candidate = CandidateResponses::new();
            for (identifier, values) in responses {
                candidate.set(identifier, values);
            }
            for (identifier, value) in scoring.evaluate(&candidate)? {
                println!("{identifier} = {value}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Codecs => {
            for node_type in CodecRegistry::shared().list_types() {
                println!("{node_type}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { items_path, indent } => {
            let mut config = config;
            if !apply_settings(&mut config, items_path, indent) {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(ExitCode::SUCCESS);
            }
            config.save().context("Failed to save configuration")?;
            log::info!("saved {}", Config::config_path().display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Apply settings given on the command line. Returns whether anything changed.
fn apply_settings(config: &mut Config, items_path: Option<PathBuf>, indent: Option<usize>) -> bool {
    let changed = items_path.is_some() || indent.is_some();
    if let Some(items_path) = items_path {
        config.items_path = Some(items_path);
    }
    if let Some(indent) = indent {
        config.serialize.indent = indent;
    }
    changed
}

fn roundtrip(
    config: &Config,
    file: &Path,
    mode: Option<ProcessingMode>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let source = read_item(config, file)?;
    let parsed = parse(&source);
    for diagnostic in &parsed.diagnostics {
        eprintln!("parse: {diagnostic}");
    }

    let doc = match mode {
        Some(mode) => parsed.document.with_processing_mode(mode),
        None => parsed.document,
    };
    let options = SerializeOptions {
        indent: config.serialize.indent,
    };
    let result = serialize_with(&doc, Some(&source), CodecRegistry::shared(), &options);
    for error in &result.errors {
        eprintln!("serialize: {error}");
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &result.markup)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", result.markup),
    }

    if result.errors.iter().any(|error| error.is_fatal()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn read_item(config: &Config, file: &Path) -> Result<String> {
    let path = config.resolve_item(file);
    log::debug!("reading {}", path.display());
    std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_response(arg: &str) -> Result<(String, Vec<String>), String> {
    let (identifier, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{arg}'"))?;
    if identifier.is_empty() {
        return Err(format!("missing response identifier in '{arg}'"));
    }
    let values = values
        .split(',')
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    Ok((identifier.to_string(), values))
}
