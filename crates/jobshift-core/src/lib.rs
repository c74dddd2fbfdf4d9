//! Jobshift Core - live migration of scheduled jobs onto a dedicated store.
//!
//! A host keeps serving and running jobs while the coordinator moves them
//! from the legacy store to the canonical one. During the window the host
//! reads and writes through a hybrid store; once the migration completes the
//! canonical store takes over for good.

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod migration;
pub mod settings;

#[cfg(test)]
mod testing;

pub use backend::{
    BackendRegistry, HybridStore, IdPolicy, JobLogger, JobRecord, JobStore, LogEntry,
    SledJobLogger, SledJobStore,
};
pub use coordinator::{
    BackendResolver, BulkMigrateCommand, CommandRegistry, CoordinatorBuilder, ExecutionContext,
    MigrationCoordinator, Notice, StoreResolution,
};
pub use error::{CoordinatorError, Result};
pub use migration::{
    BatchRunner, MigrationConfig, MigrationPhase, MigrationScheduler, RunOptions, RunSummary,
    SledMigrationScheduler,
};
pub use settings::CoordinatorSettings;
