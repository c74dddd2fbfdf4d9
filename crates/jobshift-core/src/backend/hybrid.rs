//! Store spanning legacy and canonical storage during the migration window.

use std::sync::Arc;

use tracing::debug;

use super::classes::HYBRID_STORE;
use super::record::JobRecord;
use super::store::{JobLogger, JobStore};
use crate::error::Result;

/// Reads from both stores, writes only to the canonical one.
///
/// Jobs still sitting in the legacy store stay visible until the runner moves
/// them, and nothing new lands in legacy storage. Saving a legacy job moves
/// it to canonical storage under the same id, together with its log entries
/// when loggers are attached.
pub struct HybridStore {
    legacy: Arc<dyn JobStore>,
    canonical: Arc<dyn JobStore>,
    logs: Option<(Arc<dyn JobLogger>, Arc<dyn JobLogger>)>,
}

impl HybridStore {
    /// Create a hybrid over a legacy and a canonical store.
    ///
    /// `canonical` must keep the id of a job saved with one
    /// ([`IdPolicy::AssignWhenUnset`](super::IdPolicy::AssignWhenUnset)).
    pub fn new(legacy: Arc<dyn JobStore>, canonical: Arc<dyn JobStore>) -> Self {
        Self {
            legacy,
            canonical,
            logs: None,
        }
    }

    /// Move log entries along with jobs promoted out of legacy storage.
    pub fn with_logs(mut self, legacy: Arc<dyn JobLogger>, canonical: Arc<dyn JobLogger>) -> Self {
        self.logs = Some((legacy, canonical));
        self
    }

    fn promote(&self, job: &JobRecord) -> Result<u64> {
        let id = self.canonical.save(job)?;
        if let Some((legacy_logs, canonical_logs)) = &self.logs {
            for mut entry in legacy_logs.entries(job.id)? {
                entry.job_id = id;
                canonical_logs.append(&entry)?;
            }
            legacy_logs.delete_entries(job.id)?;
        }
        self.legacy.delete(job.id)?;
        debug!(id, "promoted legacy job on update");
        Ok(id)
    }
}

impl JobStore for HybridStore {
    fn class_name(&self) -> &str {
        HYBRID_STORE
    }

    fn save(&self, job: &JobRecord) -> Result<u64> {
        if job.id != 0
            && self.canonical.get(job.id)?.is_none()
            && self.legacy.get(job.id)?.is_some()
        {
            return self.promote(job);
        }
        self.canonical.save(job)
    }

    fn get(&self, id: u64) -> Result<Option<JobRecord>> {
        match self.canonical.get(id)? {
            Some(job) => Ok(Some(job)),
            None => self.legacy.get(id),
        }
    }

    fn fetch_batch(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let mut jobs = self.canonical.fetch_batch(limit)?;
        if jobs.len() < limit {
            jobs.extend(self.legacy.fetch_batch(limit - jobs.len())?);
        }
        Ok(jobs)
    }

    fn delete(&self, id: u64) -> Result<bool> {
        let canonical = self.canonical.delete(id)?;
        let legacy = self.legacy.delete(id)?;
        Ok(canonical || legacy)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.canonical.count()? + self.legacy.count()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::{IdPolicy, SledJobLogger, SledJobStore};

    struct Fixture {
        legacy: Arc<dyn JobStore>,
        canonical: Arc<dyn JobStore>,
        legacy_logs: Arc<dyn JobLogger>,
        canonical_logs: Arc<dyn JobLogger>,
        _db: sled::Db,
    }

    impl Fixture {
        fn new() -> Self {
            let db = sled::Config::new().temporary(true).open().unwrap();
            let legacy =
                SledJobStore::open(&db, "LegacyStore", "legacy:jobs", IdPolicy::AssignWhenUnset)
                    .unwrap();
            let canonical =
                SledJobStore::open(&db, "DBStore", "jobs:store", IdPolicy::AssignWhenUnset)
                    .unwrap();
            let legacy_logs = SledJobLogger::open(&db, "LegacyLogger", "legacy:logs").unwrap();
            let canonical_logs = SledJobLogger::open(&db, "DBLogger", "jobs:logs").unwrap();
            Self {
                legacy: Arc::new(legacy),
                canonical: Arc::new(canonical),
                legacy_logs: Arc::new(legacy_logs),
                canonical_logs: Arc::new(canonical_logs),
                _db: db,
            }
        }

        fn hybrid(&self) -> HybridStore {
            HybridStore::new(self.legacy.clone(), self.canonical.clone())
                .with_logs(self.legacy_logs.clone(), self.canonical_logs.clone())
        }
    }

    #[test]
    fn test_reads_span_both_stores() {
        let fixture = Fixture::new();
        fixture.legacy.save(&JobRecord::new("old", 1).with_id(5)).unwrap();

        let hybrid = fixture.hybrid();
        let new_id = hybrid.save(&JobRecord::new("new", 2)).unwrap();

        assert!(fixture.canonical.get(new_id).unwrap().is_some());
        assert_eq!(hybrid.get(5).unwrap().unwrap().hook, "old");
        assert_eq!(hybrid.count().unwrap(), 2);
        assert_eq!(hybrid.fetch_batch(10).unwrap().len(), 2);
        assert_eq!(hybrid.class_name(), HYBRID_STORE);
    }

    #[test]
    fn test_update_of_canonical_job_overwrites_it() {
        let fixture = Fixture::new();
        let hybrid = fixture.hybrid();

        let id = hybrid.save(&JobRecord::new("new", 1)).unwrap();
        let updated = hybrid.save(&JobRecord::new("new", 2).with_id(id)).unwrap();

        assert_eq!(updated, id);
        assert_eq!(hybrid.count().unwrap(), 1);
        assert_eq!(hybrid.get(id).unwrap().unwrap().scheduled_for, 2);
    }

    #[test]
    fn test_update_of_legacy_job_moves_it_with_logs() {
        let fixture = Fixture::new();
        let id = fixture.legacy.save(&JobRecord::new("old", 1)).unwrap();
        fixture.legacy_logs.log(id, "created").unwrap();
        fixture.legacy_logs.log(id, "started").unwrap();

        let hybrid = fixture.hybrid();
        let moved = hybrid.save(&JobRecord::new("old", 99).with_id(id)).unwrap();

        assert_eq!(moved, id);
        assert!(fixture.legacy.get(id).unwrap().is_none());
        assert_eq!(fixture.canonical.get(id).unwrap().unwrap().scheduled_for, 99);
        assert_eq!(hybrid.count().unwrap(), 1);

        assert!(fixture.legacy_logs.entries(id).unwrap().is_empty());
        let entries = fixture.canonical_logs.entries(id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "created");
        assert_eq!(entries[1].message, "started");

        // A second update stays in place.
        hybrid.save(&JobRecord::new("old", 100).with_id(id)).unwrap();
        assert_eq!(hybrid.count().unwrap(), 1);
        assert_eq!(fixture.canonical_logs.entries(id).unwrap().len(), 2);
    }

    #[test]
    fn test_update_without_loggers_moves_job_only() {
        let fixture = Fixture::new();
        let id = fixture.legacy.save(&JobRecord::new("old", 1)).unwrap();
        fixture.legacy_logs.log(id, "created").unwrap();

        let hybrid = HybridStore::new(fixture.legacy.clone(), fixture.canonical.clone());
        assert_eq!(hybrid.save(&JobRecord::new("old", 2).with_id(id)).unwrap(), id);

        assert!(fixture.legacy.get(id).unwrap().is_none());
        assert_eq!(fixture.legacy_logs.entries(id).unwrap().len(), 1);
    }
}
