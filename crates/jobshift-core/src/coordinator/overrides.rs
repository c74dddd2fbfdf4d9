//! Host overrides captured during resolution.

use std::sync::OnceLock;

/// Backend overrides captured from the host.
///
/// Every field is written at most once for the coordinator's lifetime; later
/// writes are ignored. No locks: concurrent first writers race on the
/// `OnceLock` and exactly one value sticks.
#[derive(Debug, Default)]
pub struct OverrideState {
    store: OnceLock<String>,
    logger: OnceLock<String>,
    allow_custom_migration: OnceLock<bool>,
}

impl OverrideState {
    /// Create an empty override state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured non-default store class, if any.
    pub fn store_override(&self) -> Option<&str> {
        self.store.get().map(String::as_str)
    }

    /// The captured logger class, if any.
    pub fn logger_override(&self) -> Option<&str> {
        self.logger.get().map(String::as_str)
    }

    /// Capture a store override. Returns whether this call set it.
    pub(crate) fn capture_store(&self, class: &str) -> bool {
        self.store.get().is_none() && self.store.set(class.to_string()).is_ok()
    }

    /// Capture a logger override. Refused while no store override exists.
    pub(crate) fn capture_logger(&self, class: &str) -> bool {
        self.store.get().is_some()
            && self.logger.get().is_none()
            && self.logger.set(class.to_string()).is_ok()
    }

    /// Whether migrating away from the current store is allowed.
    ///
    /// Always true without a store override: moving the default flow needs no
    /// opt-in. With one, `opt_in` is consulted once and cached.
    pub(crate) fn allow_custom_migration(&self, opt_in: impl FnOnce() -> bool) -> bool {
        if self.store.get().is_none() {
            return true;
        }
        *self.allow_custom_migration.get_or_init(opt_in)
    }
}
