//! Store and logger class resolution.

use std::sync::Arc;

use tracing::debug;

use super::overrides::OverrideState;
use crate::backend::classes::{CANONICAL_LOGGER, CANONICAL_STORE, DEFAULT_STORE_MARKER, HYBRID_STORE};
use crate::error::Result;
use crate::migration::MigrationScheduler;

/// Outcome of store resolution.
///
/// Logger resolution takes this as input, so a store decision always exists
/// before a logger decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResolution {
    /// The coordinator is inert; the host's choice stands.
    Passthrough(String),
    /// Migration is complete; the canonical store is authoritative.
    PostMigration,
    /// The host uses its own store; left untouched before migration.
    Custom(String),
    /// The migration window: reads and writes span legacy and canonical storage.
    Hybrid,
}

impl StoreResolution {
    /// The store class to instantiate.
    pub fn class(&self) -> &str {
        match self {
            StoreResolution::Passthrough(class) | StoreResolution::Custom(class) => class,
            StoreResolution::PostMigration => CANONICAL_STORE,
            StoreResolution::Hybrid => HYBRID_STORE,
        }
    }
}

impl std::fmt::Display for StoreResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class())
    }
}

/// Strategy deciding which backend classes are active.
pub trait BackendResolver: Send + Sync {
    /// Map the host's requested store class to the one actually used.
    fn resolve_store(&self, requested: &str) -> Result<StoreResolution>;

    /// Map the host's requested logger class to the one actually used.
    fn resolve_logger(&self, store: &StoreResolution, requested: &str) -> Result<String>;
}

/// The standard resolver.
pub struct DefaultResolver {
    scheduler: Arc<dyn MigrationScheduler>,
    overrides: Arc<OverrideState>,
}

impl DefaultResolver {
    /// Create a resolver recording overrides into `overrides`.
    pub fn new(scheduler: Arc<dyn MigrationScheduler>, overrides: Arc<OverrideState>) -> Self {
        Self {
            scheduler,
            overrides,
        }
    }
}

impl BackendResolver for DefaultResolver {
    fn resolve_store(&self, requested: &str) -> Result<StoreResolution> {
        if self.scheduler.is_complete()? {
            return Ok(StoreResolution::PostMigration);
        }

        if requested != DEFAULT_STORE_MARKER {
            if self.overrides.capture_store(requested) {
                debug!(class = requested, "captured store override");
            }
            return Ok(StoreResolution::Custom(requested.to_string()));
        }

        Ok(StoreResolution::Hybrid)
    }

    fn resolve_logger(&self, store: &StoreResolution, requested: &str) -> Result<String> {
        match store {
            StoreResolution::Passthrough(_) => Ok(requested.to_string()),
            StoreResolution::PostMigration => Ok(CANONICAL_LOGGER.to_string()),
            StoreResolution::Custom(_) | StoreResolution::Hybrid => {
                if self.overrides.store_override().is_some() {
                    if self.overrides.capture_logger(requested) {
                        debug!(class = requested, "captured logger override");
                    }
                    Ok(requested.to_string())
                } else {
                    Ok(CANONICAL_LOGGER.to_string())
                }
            }
        }
    }
}
