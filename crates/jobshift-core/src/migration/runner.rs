//! Bounded-batch migration runner.
//!
//! Moves jobs and their log entries from the source backends to the
//! destination backends of a [`MigrationConfig`]. Each job is written to the
//! destination before it is removed from the source, so an interrupted run
//! can be resumed by running again.

use std::sync::Arc;

use tracing::{debug, info};

use super::config::{MigrationConfig, ProgressReporter};
use super::scheduler::MigrationScheduler;
use crate::backend::{JobLogger, JobRecord, JobStore};
use crate::error::{CoordinatorError, Result};

/// Default number of jobs moved per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Options for a migration run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Jobs per batch.
    pub batch_size: usize,
    /// Stop after this many batches. None runs until the source is empty.
    pub max_batches: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_batches: None,
        }
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs moved.
    pub moved: usize,
    /// Non-empty batches processed.
    pub batches: usize,
    /// Whether the source drained and the migration was marked complete.
    pub complete: bool,
}

/// Executes a migration described by a [`MigrationConfig`].
pub struct BatchRunner {
    source_store: Arc<dyn JobStore>,
    source_logger: Arc<dyn JobLogger>,
    destination_store: Arc<dyn JobStore>,
    destination_logger: Arc<dyn JobLogger>,
    progress: Option<Arc<dyn ProgressReporter>>,
    scheduler: Arc<dyn MigrationScheduler>,
}

impl BatchRunner {
    /// Create a runner. Fails if the config lacks any backend.
    pub fn new(config: &MigrationConfig, scheduler: Arc<dyn MigrationScheduler>) -> Result<Self> {
        config.validate()?;
        let missing = |missing| CoordinatorError::IncompleteConfig { missing };
        Ok(Self {
            source_store: Arc::clone(config.source_store().ok_or_else(|| missing("source store"))?),
            source_logger: Arc::clone(
                config.source_logger().ok_or_else(|| missing("source logger"))?,
            ),
            destination_store: Arc::clone(
                config
                    .destination_store()
                    .ok_or_else(|| missing("destination store"))?,
            ),
            destination_logger: Arc::clone(
                config
                    .destination_logger()
                    .ok_or_else(|| missing("destination logger"))?,
            ),
            progress: config.progress_reporter().cloned(),
            scheduler,
        })
    }

    /// Move up to `size` jobs. Returns how many moved.
    pub fn run_batch(&self, size: usize) -> Result<usize> {
        let jobs = self.source_store.fetch_batch(size)?;
        for job in &jobs {
            self.migrate_job(job)?;
        }
        Ok(jobs.len())
    }

    fn migrate_job(&self, job: &JobRecord) -> Result<()> {
        let id = self.destination_store.save(job)?;
        for mut entry in self.source_logger.entries(job.id)? {
            entry.job_id = id;
            self.destination_logger.append(&entry)?;
        }
        self.source_store.delete(job.id)?;
        self.source_logger.delete_entries(job.id)?;
        debug!(source_id = job.id, destination_id = id, hook = %job.hook, "migrated job");
        Ok(())
    }

    /// Run batches until the source drains or `max_batches` is hit.
    pub fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let batch_size = options.batch_size.max(1);
        let mut summary = RunSummary::default();

        if let Some(progress) = &self.progress {
            progress.start(self.source_store.count()?);
        }

        while options.max_batches.map_or(true, |max| summary.batches < max) {
            let moved = self.run_batch(batch_size)?;
            if moved == 0 {
                break;
            }
            summary.moved += moved;
            summary.batches += 1;
            if let Some(progress) = &self.progress {
                progress.tick(moved);
            }
        }

        if self.source_store.count()? == 0 {
            self.scheduler.mark_complete()?;
            summary.complete = true;
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }
        info!(
            moved = summary.moved,
            batches = summary.batches,
            complete = summary.complete,
            "migration run ended"
        );
        Ok(summary)
    }
}
