//! catalog-sync CLI
//!
//! Local execution entry point. For AWS Lambda, use `catalog-sync-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use catalog_sync::{
    error::{AppError, Result},
    models::{Config, WorkUnit},
    pipeline::{self, Orchestrator, RunOptions, cancel_pair},
    storage::{DatasetStorage, LocalStore, RunLock, lock::LOCK_FILE_NAME},
};

/// catalog-sync - Course Catalog Scraper
#[derive(Parser, Debug)]
#[command(
    name = "catalog-sync",
    version,
    about = "Scrapes a course catalog and syncs per-term data files"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the local store directory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape one term/subject pair and print the records as JSON
    Scrape {
        #[arg(long)]
        term: String,
        #[arg(long)]
        subject: String,
    },

    /// Scrape every configured term and subject into the local store
    ScrapeAll {
        /// Sync to deployment targets afterwards
        #[arg(long, conflicts_with = "no_sync")]
        sync: bool,

        /// Skip the sync even if enabled in config or environment
        #[arg(long)]
        no_sync: bool,

        /// Write terms even when their record count dropped sharply
        #[arg(long)]
        force: bool,
    },

    /// Sync the existing local store to every deployment target
    Deploy,

    /// Remove the store lock left behind by a killed run
    Unlock,

    /// Validate the configuration
    Validate,

    /// Show local store contents and the last run
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    if let Some(store) = &cli.store {
        config.storage.local_dir = store.clone();
    }
    let store = LocalStore::from_config(&config.storage);

    match cli.command {
        Command::Scrape { term, subject } => {
            config.validate()?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let unit = WorkUnit::new(term.trim(), subject.trim());
            let records = pipeline::run_single(&config, &orchestrator, &unit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            log::info!("{}: {} records", unit, records.len());
        }

        Command::ScrapeAll {
            sync,
            no_sync,
            force,
        } => {
            config.validate()?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let options = RunOptions {
                sync: !no_sync && (sync || config.sync_enabled(false)),
                force,
            };

            let (handle, signal) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, cancelling run...");
                    handle.cancel();
                }
            });

            let report =
                pipeline::run_scrape_all(&config, &orchestrator, &store, options, &signal).await?;

            if report.cancelled {
                log::warn!("Run cancelled ({} units unattempted)", report.units_unattempted());
                std::process::exit(130);
            }
            for held in &report.terms_held_back {
                log::warn!("Held back {}: {}", held.term, held.reason);
            }
            if !report.success {
                if config.deploy.allow_partial {
                    log::warn!("Partial sync allowed by configuration");
                } else {
                    report.ensure_synced()?;
                }
            }
        }

        Command::Deploy => {
            let report = pipeline::run_deploy(&config, &store).await?;
            report.ensure_complete()?;
        }

        Command::Unlock => {
            if RunLock::break_lock(store.root())? {
                log::warn!("Removed run lock in {}", store.root().display());
            } else {
                log::info!("No run lock in {}", store.root().display());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            let units = WorkUnit::matrix(&config.scrape.terms, &config.scrape.subjects);
            log::info!(
                "✓ Config OK ({} terms × {} subjects = {} units, {} targets)",
                config.scrape.terms.len(),
                config.scrape.subjects.len(),
                units.len(),
                config.deploy.targets.len()
            );
        }

        Command::Info => {
            log::info!("Config file: {}", cli.config.display());
            log::info!("Local store: {}", store.root().display());
            log::info!("Sync enabled: {}", config.sync_enabled(false));

            if !store.root().exists() {
                return Err(AppError::StoreMissing {
                    path: store.root().to_path_buf(),
                });
            }
            if store.root().join(LOCK_FILE_NAME).exists() {
                log::warn!(
                    "A run holds the store lock; if none is running, use `catalog-sync unlock`"
                );
            }

            for term in &config.scrape.terms {
                match store.load_term(term).await? {
                    Some(dataset) => log::info!("  {}: {} records", term, dataset.len()),
                    None => log::info!("  {}: no data file", term),
                }
            }
            let files = store.eligible_files().await?;
            log::info!("Eligible files: {}", files.len());

            match store.load_report().await? {
                Some(report) => {
                    log::info!(
                        "Last run: {} ({} / {} units, {} records, success: {})",
                        report.finished_at,
                        report.units_succeeded,
                        report.units_attempted,
                        report.records_written,
                        report.success
                    );
                }
                None => log::info!("No run report found yet."),
            }
        }
    }

    Ok(())
}
