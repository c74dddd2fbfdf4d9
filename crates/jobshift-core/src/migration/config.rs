//! Migration run configuration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::backend::{JobLogger, JobStore};
use crate::error::{CoordinatorError, Result};

/// Receives progress from a migration run.
pub trait ProgressReporter: Send + Sync {
    /// A run is starting with `total` jobs in the source.
    fn start(&self, total: usize);

    /// `moved` more jobs were migrated.
    fn tick(&self, moved: usize);

    /// The run ended.
    fn finish(&self);
}

/// [`ProgressReporter`] writing to the `tracing` log.
#[derive(Debug, Default)]
pub struct TracingProgressReporter {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl TracingProgressReporter {
    /// Create a reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs reported as moved so far.
    pub fn moved(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        info!(total, "migrating scheduled jobs");
    }

    fn tick(&self, moved: usize) {
        let done = self.done.fetch_add(moved, Ordering::Relaxed) + moved;
        let total = self.total.load(Ordering::Relaxed);
        info!(done, total, "migrated {} jobs", moved);
    }

    fn finish(&self) {
        info!(moved = self.moved(), "migration run finished");
    }
}

/// Pairs source and destination backends for one migration run.
///
/// Built fresh for each run and discarded afterwards.
#[derive(Clone, Default)]
pub struct MigrationConfig {
    source_store: Option<Arc<dyn JobStore>>,
    source_logger: Option<Arc<dyn JobLogger>>,
    destination_store: Option<Arc<dyn JobStore>>,
    destination_logger: Option<Arc<dyn JobLogger>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl MigrationConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store jobs are moved out of.
    pub fn set_source_store(&mut self, store: Arc<dyn JobStore>) -> &mut Self {
        self.source_store = Some(store);
        self
    }

    /// Set the logger whose entries are moved.
    pub fn set_source_logger(&mut self, logger: Arc<dyn JobLogger>) -> &mut Self {
        self.source_logger = Some(logger);
        self
    }

    /// Set the store jobs are moved into.
    pub fn set_destination_store(&mut self, store: Arc<dyn JobStore>) -> &mut Self {
        self.destination_store = Some(store);
        self
    }

    /// Set the logger entries are moved into.
    pub fn set_destination_logger(&mut self, logger: Arc<dyn JobLogger>) -> &mut Self {
        self.destination_logger = Some(logger);
        self
    }

    /// Attach a progress reporter.
    pub fn set_progress_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) -> &mut Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn source_store(&self) -> Option<&Arc<dyn JobStore>> {
        self.source_store.as_ref()
    }

    pub fn source_logger(&self) -> Option<&Arc<dyn JobLogger>> {
        self.source_logger.as_ref()
    }

    pub fn destination_store(&self) -> Option<&Arc<dyn JobStore>> {
        self.destination_store.as_ref()
    }

    pub fn destination_logger(&self) -> Option<&Arc<dyn JobLogger>> {
        self.destination_logger.as_ref()
    }

    pub fn progress_reporter(&self) -> Option<&Arc<dyn ProgressReporter>> {
        self.progress_reporter.as_ref()
    }

    /// Check that all four backends are present.
    pub fn validate(&self) -> Result<()> {
        let missing = if self.source_store.is_none() {
            Some("source store")
        } else if self.source_logger.is_none() {
            Some("source logger")
        } else if self.destination_store.is_none() {
            Some("destination store")
        } else if self.destination_logger.is_none() {
            Some("destination logger")
        } else {
            None
        };

        match missing {
            Some(missing) => Err(CoordinatorError::IncompleteConfig { missing }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("source_store", &self.source_store.as_ref().map(|s| s.class_name()))
            .field("source_logger", &self.source_logger.as_ref().map(|l| l.class_name()))
            .field(
                "destination_store",
                &self.destination_store.as_ref().map(|s| s.class_name()),
            )
            .field(
                "destination_logger",
                &self.destination_logger.as_ref().map(|l| l.class_name()),
            )
            .field("progress_reporter", &self.progress_reporter.is_some())
            .finish()
    }
}
