//! Migration collaborators: scheduling, phase observation, run configuration
//! and the batch runner.
//!
//! # Example
//!
//! ```ignore
//! use jobshift_core::migration::{BatchRunner, RunOptions, SledMigrationScheduler};
//!
//! let scheduler = Arc::new(SledMigrationScheduler::open(&db)?);
//! let config = coordinator.build_default_config()?;
//! let summary = BatchRunner::new(&config, scheduler)?.run(&RunOptions::default())?;
//! println!("moved {} jobs", summary.moved);
//! ```

pub mod config;
pub mod phase;
pub mod runner;
pub mod scheduler;
pub mod worker;

pub use config::{MigrationConfig, ProgressReporter, TracingProgressReporter};
pub use phase::MigrationPhase;
pub use runner::{BatchRunner, RunOptions, RunSummary, DEFAULT_BATCH_SIZE};
pub use scheduler::{
    EnqueueHook, MigrationScheduler, MigrationStateRecord, MigrationStatus,
    SledMigrationScheduler,
};
pub use worker::{MigrationStep, MigrationWorker, DEFAULT_POLL_INTERVAL_MS};
