//! Strata CLI
//!
//! Small operational wrapper around the library: inspect a store and
//! copy recordings between stores.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use strata::config::MapperConfig;
use strata::logging::{init_logging, LoggingConfig};
use strata::{Mode, RecordingStore};
use tracing::error;

#[derive(Parser)]
#[command(name = "strata", version, about = "Recording-tree store tooling")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable log output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON summary of every recording in a store
    Info {
        /// Store location
        location: PathBuf,
    },
    /// Copy all recordings from one store into a fresh one
    Copy {
        source: PathBuf,
        destination: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default();
    if !cli.verbose {
        logging.level = "off".to_string();
    }
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = run(&cli) {
        error!("command failed: {e:#}");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => MapperConfig::load(Some(path))
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => MapperConfig::default(),
    };

    match &cli.command {
        Command::Info { location } => info(location, config),
        Command::Copy {
            source,
            destination,
        } => copy(source, destination, config),
    }
}

fn info(location: &PathBuf, config: MapperConfig) -> anyhow::Result<()> {
    let store = RecordingStore::open_with(location, Mode::ReadOnly, config)
        .with_context(|| format!("opening store at {}", location.display()))?;
    let recordings = store.read_all().context("reading recordings")?;

    let mut summaries = Vec::new();
    for recording in &recordings {
        let signals: usize = recording.sub_recordings.iter().map(|s| s.signals.len()).sum();
        let mut series = 0usize;
        for sub in &recording.sub_recordings {
            series += sub.series.len().context("loading series")?;
        }
        summaries.push(serde_json::json!({
            "name": recording.name,
            "sub_recordings": recording.sub_recordings.len(),
            "signals": signals,
            "series": series,
            "groups": recording.groups.len(),
        }));
    }
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    store.close().context("closing store")?;
    Ok(())
}

fn copy(source: &PathBuf, destination: &PathBuf, config: MapperConfig) -> anyhow::Result<()> {
    let from = RecordingStore::open_with(source, Mode::ReadOnly, config.clone())
        .with_context(|| format!("opening store at {}", source.display()))?;
    let recordings = from.read_all().context("reading recordings")?;

    let to = RecordingStore::open_with(destination, Mode::Overwrite, config)
        .with_context(|| format!("opening store at {}", destination.display()))?;
    let outcomes = to.write_all(&recordings).context("writing recordings")?;
    for outcome in &outcomes {
        println!("copied {}", outcome.container);
        for diag in &outcome.diagnostics {
            eprintln!("  note: {} at {}", diag.message, diag.path);
        }
    }

    from.close().context("closing source")?;
    to.close().context("closing destination")?;
    Ok(())
}
