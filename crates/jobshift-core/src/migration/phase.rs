//! Migration phase as observed from a scheduler.

use super::scheduler::MigrationScheduler;
use crate::error::Result;

/// Where the migration stands.
///
/// Derived on demand from the scheduler's persisted state; never stored by
/// the coordinator. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// The destination schema is missing; nothing may run.
    DependenciesNotMet,
    /// Migration may be scheduled but has not been.
    EligibleNotScheduled,
    /// Migration is enqueued.
    Scheduled,
    /// Migration finished.
    Complete,
}

impl MigrationPhase {
    /// Observe the current phase.
    pub fn observe(scheduler: &dyn MigrationScheduler) -> Result<Self> {
        if scheduler.is_complete()? {
            Ok(MigrationPhase::Complete)
        } else if !scheduler.dependencies_met()? {
            Ok(MigrationPhase::DependenciesNotMet)
        } else if scheduler.is_scheduled()? {
            Ok(MigrationPhase::Scheduled)
        } else {
            Ok(MigrationPhase::EligibleNotScheduled)
        }
    }

    /// Whether this phase can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationPhase::Complete)
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationPhase::DependenciesNotMet => write!(f, "dependencies not met"),
            MigrationPhase::EligibleNotScheduled => write!(f, "eligible, not scheduled"),
            MigrationPhase::Scheduled => write!(f, "scheduled"),
            MigrationPhase::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::scheduler::SledMigrationScheduler;

    #[test]
    fn test_phase_progression() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let scheduler = SledMigrationScheduler::open(&db).unwrap();

        assert_eq!(
            MigrationPhase::observe(&scheduler).unwrap(),
            MigrationPhase::DependenciesNotMet
        );

        scheduler.install_schema().unwrap();
        assert_eq!(
            MigrationPhase::observe(&scheduler).unwrap(),
            MigrationPhase::EligibleNotScheduled
        );

        scheduler.schedule_migration().unwrap();
        assert_eq!(
            MigrationPhase::observe(&scheduler).unwrap(),
            MigrationPhase::Scheduled
        );

        scheduler.mark_complete().unwrap();
        let phase = MigrationPhase::observe(&scheduler).unwrap();
        assert_eq!(phase, MigrationPhase::Complete);
        assert!(phase.is_terminal());
        assert_eq!(phase.to_string(), "complete");
    }
}
