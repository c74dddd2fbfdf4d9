//! Jobshift Command-Line Tool
//!
//! Inspects and drives the scheduled job migration of a jobshift database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use jobshift_core::backend::{BackendRegistry, CANONICAL_STORE, LEGACY_STORE};
use jobshift_core::coordinator::{self, CommandRegistry, ExecutionContext, MIGRATE_COMMAND};
use jobshift_core::migration::{MigrationPhase, RunOptions, DEFAULT_BATCH_SIZE};
use jobshift_core::settings::DEFAULT_DATA_PATH;
use jobshift_core::{CoordinatorError, CoordinatorSettings, SledMigrationScheduler};

/// Jobshift Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "jobshift")]
#[command(version, about = "Scheduled job migration tool")]
pub struct Args {
    /// Path to the job database
    #[arg(short = 'd', long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the canonical job store
    Install,

    /// Show migration status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Schedule the background migration if it is due
    Schedule,

    /// Migrate all scheduled jobs now
    Migrate {
        /// Jobs per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Stop after this many batches
        #[arg(long)]
        batches: Option<usize>,

        /// Host store class to migrate from
        #[arg(long)]
        store: Option<String>,

        /// Host logger class to migrate from
        #[arg(long)]
        logger: Option<String>,

        /// Allow migrating out of a host store class
        #[arg(long)]
        allow_custom: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("failed to format output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jobshift=info".parse().unwrap())
                .add_directive("jobshift_core=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let settings = CoordinatorSettings::new(&args.data_path);

    match args.command {
        Command::Install => install(&settings),
        Command::Status { json } => status(&settings, json),
        Command::Schedule => schedule(&settings),
        Command::Migrate {
            batch_size,
            batches,
            store,
            logger,
            allow_custom,
        } => {
            let mut settings = settings
                .with_context(ExecutionContext::CommandLine)
                .with_batch_size(batch_size)
                .with_allow_custom_migration(allow_custom);
            if let Some(store) = store {
                settings = settings.with_store_class(store);
            }
            if let Some(logger) = logger {
                settings = settings.with_logger_class(logger);
            }
            migrate(&settings, batches)
        }
    }
}

fn install(settings: &CoordinatorSettings) -> Result<(), CliError> {
    let db = settings.open_db()?;
    SledMigrationScheduler::open(&db)?.install_schema()?;
    db.flush().map_err(CoordinatorError::from)?;
    println!("Installed canonical job store at {}", settings.data_path.display());
    Ok(())
}

fn status(settings: &CoordinatorSettings, json: bool) -> Result<(), CliError> {
    let db = settings.open_db()?;
    let scheduler = SledMigrationScheduler::open(&db)?;
    let phase = MigrationPhase::observe(&scheduler)?;
    let state = scheduler.state()?;

    let backends = BackendRegistry::with_defaults(&db);
    let legacy = backends.create_store(LEGACY_STORE)?.count()?;
    // Opening the canonical store creates its tree; only count it once installed.
    let canonical = if phase == MigrationPhase::DependenciesNotMet {
        0
    } else {
        backends.create_store(CANONICAL_STORE)?.count()?
    };

    if json {
        let report = serde_json::json!({
            "phase": phase.to_string(),
            "status": state.status.to_string(),
            "scheduled_at": state.scheduled_at,
            "completed_at": state.completed_at,
            "legacy_jobs": legacy,
            "canonical_jobs": canonical,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Phase:          {}", phase);
    println!("Legacy jobs:    {}", legacy);
    println!("Canonical jobs: {}", canonical);
    if let Some(at) = state.scheduled_at {
        println!("Scheduled at:   {}", at);
    }
    if let Some(at) = state.completed_at {
        println!("Completed at:   {}", at);
    }
    Ok(())
}

fn schedule(settings: &CoordinatorSettings) -> Result<(), CliError> {
    let db = settings.open_db()?;
    let coordinator = settings.builder(&db)?.build();

    if !coordinator.start(&CommandRegistry::new())? {
        println!("Canonical job store is not installed; run `jobshift install` first");
        return Ok(());
    }

    if coordinator.on_request_end()? {
        println!("Migration scheduled");
    } else {
        println!("Nothing to schedule ({})", coordinator.phase()?);
    }
    Ok(())
}

fn migrate(settings: &CoordinatorSettings, batches: Option<usize>) -> Result<(), CliError> {
    let coordinator = coordinator::init(settings)?;

    let Some(command) = coordinator::commands().get(MIGRATE_COMMAND) else {
        let reason = if !coordinator.is_active() {
            "canonical job store is not installed".to_string()
        } else if !coordinator.allow_custom_migration() {
            "a host store is in use; pass --allow-custom to migrate it".to_string()
        } else {
            format!("migration is {}", coordinator.phase()?)
        };
        println!("Nothing to migrate: {}", reason);
        return Ok(());
    };

    let options = RunOptions {
        max_batches: batches,
        ..settings.run_options()
    };
    info!(batch_size = options.batch_size, "starting migration");
    let summary = command.run(&options)?;

    println!(
        "Migrated {} jobs in {} batches{}",
        summary.moved,
        summary.batches,
        if summary.complete { "; migration complete" } else { "" }
    );
    Ok(())
}
