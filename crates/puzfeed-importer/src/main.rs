//! # puzfeed-importer
//!
//! Worker binary for the puzzle import pipeline. Runs passes on an interval
//! by default; the subcommands run a single pass, a consistency check, or
//! manage sources.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use puzfeed_importer::{sources, ImporterConfig, Processor};
use puzfeed_store::Database;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "puzfeed-importer", version, about = "Import staged .puz files into the puzzle catalog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run passes on an interval until interrupted (default)
    Watch,
    /// Run one pass and print its report as JSON
    Pass,
    /// Compare accepted folders with the database and print the differences
    Reconcile,
    /// Create missing folders for every source
    ProvisionAll,
    /// Register a source and create its folders
    AddSource {
        name: String,
        #[arg(long)]
        short_code: Option<String>,
    },
    /// Delete a source, its puzzle records and its folders
    RemoveSource {
        /// Short code or UUID
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,puzfeed_importer=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = ImporterConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = Database::open_at(&config.database_path)
        .with_context(|| format!("opening database at {}", config.database_path.display()))?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(config, db).await?,
        Command::Pass => {
            let processor = processor_for(&config, db);
            let report = processor.run_pass();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reconcile => {
            let processor = processor_for(&config, db);
            let report = processor.reconcile()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ProvisionAll => {
            let layouts = sources::provision_all(&db, &config.puzzles_path)?;
            info!(count = layouts.len(), "provisioned all sources");
        }
        Command::AddSource { name, short_code } => {
            let (source, layout) =
                sources::add_source(&db, &config.puzzles_path, &name, short_code.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&source)?);
            info!(path = %layout.staging_dir.display(), "drop uploads here");
        }
        Command::RemoveSource { identifier } => {
            match sources::remove_source(&db, &config.puzzles_path, &identifier)? {
                Some(source) => println!("{}", serde_json::to_string_pretty(&source)?),
                None => anyhow::bail!("no source matches {identifier:?}"),
            }
        }
    }

    Ok(())
}

fn processor_for(config: &ImporterConfig, db: Database) -> Processor<Database> {
    Processor::new(&config.puzzles_path, db).with_max_suffix(config.max_collision_suffix)
}

/// Run a pass every `scan_interval` until ctrl-c.
///
/// Passes run on the blocking pool one at a time; a slow pass delays the
/// next tick instead of overlapping it. Ctrl-c is only seen between passes,
/// so shutdown waits for the pass in flight to finish.
async fn watch(config: ImporterConfig, db: Database) -> anyhow::Result<()> {
    let processor = Arc::new(Mutex::new(processor_for(&config, db)));

    let mut interval = tokio::time::interval(config.scan_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        root = %config.puzzles_path.display(),
        interval_secs = config.scan_interval.as_secs(),
        "Importer watching for uploads"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let processor = Arc::clone(&processor);
                let pass = tokio::task::spawn_blocking(move || {
                    processor
                        .lock()
                        .map(|p| p.run_pass())
                        .map_err(|_| anyhow::anyhow!("processor lock poisoned"))
                })
                .await;
                match pass {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => error!(error = %e, "import pass panicked"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
