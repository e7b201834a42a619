use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flags::EmbedMode;
use litmap_classifier::{EngineConfig, MappingEngine};
use litmap_embeddings::{EMBEDDING_MODEL_ENV, EMBEDDING_MODE_ENV, MODEL_DIR_ENV};
use serde::Serialize;
use serde_json::json;
use std::env;
use std::io;
use std::path::PathBuf;

mod flags;
mod input;

const PROFILE_ENV: &str = "LITMAP_PROFILE";

#[derive(Parser)]
#[command(name = "litmap")]
#[command(about = "Classify and group literature-mapping articles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Profile file (JSON or TOML) merged over the bundled defaults
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Override embedding model id
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Model directory (overrides LITMAP_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign every item to one category, guaranteeing category coverage
    Classify(InputArgs),

    /// Label research approaches and group similar ones
    Approaches(ApproachesArgs),

    /// Share of items per grouped research approach
    Distribution(InputArgs),

    /// Print the effective taxonomies
    Categories(OutputArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct InputArgs {
    /// Items as a JSON array or {"items": [...]}; `-` reads stdin
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ApproachesArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Requested number of clusters (clamped to the profile bounds)
    #[arg(short, long)]
    k: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(model) = &cli.embed_model {
        env::set_var(EMBEDDING_MODEL_ENV, model);
    }
    if let Some(dir) = &cli.model_dir {
        env::set_var(MODEL_DIR_ENV, dir);
    }
    if let Some(mode) = cli.embed_mode {
        env::set_var(EMBEDDING_MODE_ENV, mode.as_str());
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ORT logs every session option at info level.
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.profile.clone())?;

    match cli.command {
        Commands::Categories(args) => {
            let body = json!({
                "strategy": config.strategy.as_str(),
                "enforce_coverage": config.enforce_coverage,
                "categories": config.categories,
                "approaches": config.approaches,
            });
            emit(&body, args.pretty)
        }
        Commands::Classify(args) => {
            let items = input::read_items(&args.input)?;
            let engine = MappingEngine::with_shared_capability(config)?;
            let outcome = engine.classify(&items).await;
            emit(&outcome, args.output.pretty)
        }
        Commands::Approaches(args) => {
            let items = input::read_items(&args.input.input)?;
            let engine = MappingEngine::with_shared_capability(config)?;
            let approaches = engine.extract_approaches(&items).await;
            let clustering = engine.cluster_approaches(&approaches, args.k).await;
            let body = json!({
                "approaches": approaches.labels,
                "sources": approaches.sources,
                "clustering": clustering,
            });
            emit(&body, args.input.output.pretty)
        }
        Commands::Distribution(args) => {
            let items = input::read_items(&args.input)?;
            let engine = MappingEngine::with_shared_capability(config)?;
            let summary = engine.distribution(&items).await;
            emit(&summary, args.output.pretty)
        }
    }
}

fn load_config(profile: Option<PathBuf>) -> Result<EngineConfig> {
    let profile = profile.or_else(|| env::var_os(PROFILE_ENV).map(PathBuf::from));
    match profile {
        Some(path) => EngineConfig::from_path(&path)
            .with_context(|| format!("Failed to load profile {}", path.display())),
        None => EngineConfig::builtin().context("Bundled profile is invalid"),
    }
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}
