//! Eligibility gate shared by every migration side effect.

use std::sync::Arc;

use super::overrides::OverrideState;
use crate::error::Result;
use crate::migration::MigrationScheduler;

/// Host opt-in for migrating out of a host-provided store.
pub type OptIn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Decides whether migration surfaces may appear.
///
/// Hook activation, command registration and the operator notice all ask
/// [`MigrationGate::eligible`], so they appear and disappear together.
pub struct MigrationGate {
    scheduler: Arc<dyn MigrationScheduler>,
    overrides: Arc<OverrideState>,
    opt_in: Option<OptIn>,
}

impl MigrationGate {
    /// Create a gate. Without an opt-in, custom stores are never migrated.
    pub fn new(
        scheduler: Arc<dyn MigrationScheduler>,
        overrides: Arc<OverrideState>,
        opt_in: Option<OptIn>,
    ) -> Self {
        Self {
            scheduler,
            overrides,
            opt_in,
        }
    }

    /// True when no store override was captured, otherwise the cached opt-in.
    pub fn allow_custom_migration(&self) -> bool {
        self.overrides
            .allow_custom_migration(|| self.opt_in.as_ref().is_some_and(|opt_in| opt_in()))
    }

    /// Migration is permitted and not yet complete.
    pub fn eligible(&self) -> Result<bool> {
        Ok(self.allow_custom_migration() && !self.scheduler.is_complete()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeScheduler;

    #[test]
    fn test_default_flow_is_eligible_until_complete() {
        let scheduler = FakeScheduler::ready();
        let gate = MigrationGate::new(scheduler.clone(), Arc::new(OverrideState::new()), None);

        assert!(gate.allow_custom_migration());
        assert!(gate.eligible().unwrap());

        scheduler.complete();
        assert!(!gate.eligible().unwrap());
    }

    #[test]
    fn test_custom_store_needs_opt_in() {
        let overrides = Arc::new(OverrideState::new());
        overrides.capture_store("MyCustomStore");

        let gate = MigrationGate::new(FakeScheduler::ready(), overrides.clone(), None);
        assert!(!gate.allow_custom_migration());
        assert!(!gate.eligible().unwrap());

        let overrides = Arc::new(OverrideState::new());
        overrides.capture_store("MyCustomStore");
        let gate = MigrationGate::new(
            FakeScheduler::ready(),
            overrides,
            Some(Arc::new(|| true)),
        );
        assert!(gate.eligible().unwrap());
    }
}
