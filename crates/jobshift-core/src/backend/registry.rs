//! Class-name to backend factory registry.

use std::sync::Arc;

use dashmap::DashMap;
use sled::Db;

use super::classes::*;
use super::hybrid::HybridStore;
use super::store::{IdPolicy, JobLogger, JobStore, SledJobLogger, SledJobStore};
use crate::error::{CoordinatorError, Result};

/// Builds a fresh store instance.
pub type StoreFactory = Arc<dyn Fn() -> Result<Arc<dyn JobStore>> + Send + Sync>;

/// Builds a fresh logger instance.
pub type LoggerFactory = Arc<dyn Fn() -> Result<Arc<dyn JobLogger>> + Send + Sync>;

/// Maps backend class names to factories.
///
/// Hosts register their own classes next to the built-in ones so a captured
/// override can be instantiated as the migration source.
#[derive(Default)]
pub struct BackendRegistry {
    stores: DashMap<String, StoreFactory>,
    loggers: DashMap<String, LoggerFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in classes registered over `db`.
    pub fn with_defaults(db: &Db) -> Self {
        let registry = Self::new();

        registry.register_sled_store(
            db,
            LEGACY_STORE,
            LEGACY_STORE_TREE,
            IdPolicy::AssignWhenUnset,
        );
        registry.register_sled_store(
            db,
            CANONICAL_STORE,
            CANONICAL_STORE_TREE,
            IdPolicy::AssignWhenUnset,
        );
        registry.register_sled_store(
            db,
            MIGRATION_STORE,
            CANONICAL_STORE_TREE,
            IdPolicy::Preserve,
        );

        let hybrid_db = db.clone();
        registry.register_store(
            HYBRID_STORE,
            Arc::new(move || -> Result<Arc<dyn JobStore>> {
                let legacy = SledJobStore::open(
                    &hybrid_db,
                    LEGACY_STORE,
                    LEGACY_STORE_TREE,
                    IdPolicy::AssignWhenUnset,
                )?;
                let canonical = SledJobStore::open(
                    &hybrid_db,
                    CANONICAL_STORE,
                    CANONICAL_STORE_TREE,
                    IdPolicy::AssignWhenUnset,
                )?;
                let legacy_logs = SledJobLogger::open(&hybrid_db, LEGACY_LOGGER, LEGACY_LOG_TREE)?;
                let canonical_logs =
                    SledJobLogger::open(&hybrid_db, CANONICAL_LOGGER, CANONICAL_LOG_TREE)?;
                let hybrid = HybridStore::new(Arc::new(legacy), Arc::new(canonical))
                    .with_logs(Arc::new(legacy_logs), Arc::new(canonical_logs));
                Ok(Arc::new(hybrid) as Arc<dyn JobStore>)
            }),
        );

        registry.register_sled_logger(db, LEGACY_LOGGER, LEGACY_LOG_TREE);
        registry.register_sled_logger(db, CANONICAL_LOGGER, CANONICAL_LOG_TREE);

        registry
    }

    /// Register (or replace) a store class.
    pub fn register_store(&self, class: impl Into<String>, factory: StoreFactory) {
        self.stores.insert(class.into(), factory);
    }

    /// Register (or replace) a logger class.
    pub fn register_logger(&self, class: impl Into<String>, factory: LoggerFactory) {
        self.loggers.insert(class.into(), factory);
    }

    /// Register a store class backed by its own sled tree.
    pub fn register_sled_store(&self, db: &Db, class: &str, tree: &str, ids: IdPolicy) {
        let (db, name, tree) = (db.clone(), class.to_string(), tree.to_string());
        self.register_store(
            class,
            Arc::new(move || -> Result<Arc<dyn JobStore>> {
                let store = SledJobStore::open(&db, name.as_str(), &tree, ids)?;
                Ok(Arc::new(store) as Arc<dyn JobStore>)
            }),
        );
    }

    /// Register a logger class backed by its own sled tree.
    pub fn register_sled_logger(&self, db: &Db, class: &str, tree: &str) {
        let (db, name, tree) = (db.clone(), class.to_string(), tree.to_string());
        self.register_logger(
            class,
            Arc::new(move || -> Result<Arc<dyn JobLogger>> {
                let logger = SledJobLogger::open(&db, name.as_str(), &tree)?;
                Ok(Arc::new(logger) as Arc<dyn JobLogger>)
            }),
        );
    }

    /// Whether a store class is registered.
    pub fn has_store(&self, class: &str) -> bool {
        self.stores.contains_key(class)
    }

    /// Whether a logger class is registered.
    pub fn has_logger(&self, class: &str) -> bool {
        self.loggers.contains_key(class)
    }

    /// Instantiate a store class.
    pub fn create_store(&self, class: &str) -> Result<Arc<dyn JobStore>> {
        // Clone the factory out so the shard lock is not held while it runs.
        let factory = self
            .stores
            .get(class)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| CoordinatorError::UnknownBackend {
                kind: "store",
                class: class.to_string(),
            })?;
        factory()
    }

    /// Instantiate a logger class.
    pub fn create_logger(&self, class: &str) -> Result<Arc<dyn JobLogger>> {
        let factory = self
            .loggers
            .get(class)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| CoordinatorError::UnknownBackend {
                kind: "logger",
                class: class.to_string(),
            })?;
        factory()
    }
}
