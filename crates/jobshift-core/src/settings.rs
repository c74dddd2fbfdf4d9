//! Coordinator settings.
//!
//! Everything a host process needs to open the job database and build a
//! [`MigrationCoordinator`](crate::coordinator::MigrationCoordinator) over it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sled::Db;

use crate::backend::{BackendRegistry, IdPolicy};
use crate::coordinator::{
    CoordinatorBuilder, ExecutionContext, MigrationCoordinator, DEFAULT_NOTICE_SCREENS,
};
use crate::error::Result;
use crate::migration::{
    RunOptions, SledMigrationScheduler, DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL_MS,
};

/// Default path of the job database.
pub const DEFAULT_DATA_PATH: &str = "./jobshift_data";

/// Default sled page cache size (64 MB).
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

/// Tree prefix for host-provided store classes without a registered backend.
pub const CUSTOM_STORE_TREE_PREFIX: &str = "custom:";

/// Tree prefix for host-provided logger classes without a registered backend.
pub const CUSTOM_LOG_TREE_PREFIX: &str = "custom-log:";

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Path to the job database directory.
    pub data_path: PathBuf,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Sled page cache size in bytes.
    pub cache_capacity: u64,

    /// How the host process is running.
    pub context: ExecutionContext,

    /// Operator screens that show the migration notice.
    pub notice_screens: Vec<String>,

    /// Allow migrating out of a host-provided store.
    pub allow_custom_migration: bool,

    /// Jobs moved per batch, by the bulk command and the background worker.
    pub batch_size: usize,

    /// How often the background migration worker polls.
    pub worker_interval: Duration,

    /// Host-provided store class. None keeps the default.
    pub store_class: Option<String>,

    /// Host-provided logger class. None keeps the default.
    pub logger_class: Option<String>,
}

impl CoordinatorSettings {
    /// Create settings for the database at `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            temporary: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            context: ExecutionContext::Request,
            notice_screens: DEFAULT_NOTICE_SCREENS.iter().map(|s| s.to_string()).collect(),
            allow_custom_migration: false,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            store_class: None,
            logger_class: None,
        }
    }

    /// Settings over a temporary database, for tests.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::new("")
        }
    }

    /// Set the execution context.
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Replace the notice screens.
    pub fn with_notice_screens<I, S>(mut self, screens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notice_screens = screens.into_iter().map(Into::into).collect();
        self
    }

    /// Opt in to migrating out of a host-provided store.
    pub fn with_allow_custom_migration(mut self, allow: bool) -> Self {
        self.allow_custom_migration = allow;
        self
    }

    /// Set the migration batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the background worker poll interval.
    pub fn with_worker_interval(mut self, interval: Duration) -> Self {
        self.worker_interval = interval;
        self
    }

    /// Use a host-provided store class.
    pub fn with_store_class(mut self, class: impl Into<String>) -> Self {
        self.store_class = Some(class.into());
        self
    }

    /// Use a host-provided logger class.
    pub fn with_logger_class(mut self, class: impl Into<String>) -> Self {
        self.logger_class = Some(class.into());
        self
    }

    /// Set the page cache size.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Run options for the bulk command.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            batch_size: self.batch_size,
            max_batches: None,
        }
    }

    /// Convert to sled configuration.
    fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(true);

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.data_path)
        }
    }

    /// Open the job database.
    pub fn open_db(&self) -> Result<Db> {
        Ok(self.to_sled_config().open()?)
    }

    /// Build a coordinator over `db` with these settings applied.
    ///
    /// Host classes with no registered backend get a sled backend of their
    /// own, so their jobs survive between runs and can be migrated.
    pub fn builder(&self, db: &Db) -> Result<CoordinatorBuilder> {
        let scheduler =
            Arc::new(SledMigrationScheduler::open(db)?.with_poll_interval(self.worker_interval));
        let backends = Arc::new(BackendRegistry::with_defaults(db));

        let mut builder = MigrationCoordinator::builder(scheduler, Arc::clone(&backends))
            .execution_context(self.context)
            .batch_size(self.batch_size)
            .notice_screens(self.notice_screens.iter().cloned());

        if let Some(class) = self.store_class.clone() {
            if !backends.has_store(&class) {
                let tree = format!("{CUSTOM_STORE_TREE_PREFIX}{class}");
                backends.register_sled_store(db, &class, &tree, IdPolicy::AssignWhenUnset);
            }
            builder = builder.store_filter(move |_| class.clone());
        }

        if let Some(class) = self.logger_class.clone() {
            if !backends.has_logger(&class) {
                let tree = format!("{CUSTOM_LOG_TREE_PREFIX}{class}");
                backends.register_sled_logger(db, &class, &tree);
            }
            builder = builder.logger_filter(move |_| class.clone());
        }

        if self.allow_custom_migration {
            builder = builder.allow_custom_migration(|| true);
        }

        Ok(builder)
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}
