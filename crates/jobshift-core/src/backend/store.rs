//! Job store and logger backends.
//!
//! Each backend class lives in its own sled tree. Keys are big-endian job ids
//! so iteration order is id order, oldest first.

use sled::{Db, Tree};

use super::record::{JobRecord, LogEntry};
use crate::error::Result;

/// Storage for scheduled jobs.
pub trait JobStore: Send + Sync {
    /// Class name this store was created under.
    fn class_name(&self) -> &str;

    /// Persist a job, returning the id it was stored under.
    fn save(&self, job: &JobRecord) -> Result<u64>;

    /// Fetch a job by id.
    fn get(&self, id: u64) -> Result<Option<JobRecord>>;

    /// Fetch up to `limit` jobs in id order.
    fn fetch_batch(&self, limit: usize) -> Result<Vec<JobRecord>>;

    /// Delete a job. Returns whether it existed.
    fn delete(&self, id: u64) -> Result<bool>;

    /// Number of stored jobs.
    fn count(&self) -> Result<usize>;
}

/// Storage for per-job log entries.
pub trait JobLogger: Send + Sync {
    /// Class name this logger was created under.
    fn class_name(&self) -> &str;

    /// Append an entry.
    fn append(&self, entry: &LogEntry) -> Result<()>;

    /// All entries for a job, oldest first.
    fn entries(&self, job_id: u64) -> Result<Vec<LogEntry>>;

    /// Delete all entries for a job, returning how many were removed.
    fn delete_entries(&self, job_id: u64) -> Result<usize>;

    /// Write a message for a job.
    fn log(&self, job_id: u64, message: &str) -> Result<()> {
        self.append(&LogEntry::new(job_id, message))
    }
}

/// How a store assigns ids on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Allocate an id only when the job has none; saving a job with an id
    /// overwrites it in place.
    AssignWhenUnset,
    /// Keep the job's id as given. Used when copying from another store.
    Preserve,
}

/// Sled-backed [`JobStore`].
pub struct SledJobStore {
    class: String,
    db: Db,
    tree: Tree,
    ids: IdPolicy,
}

impl SledJobStore {
    /// Open (or create) the store's tree.
    pub fn open(db: &Db, class: impl Into<String>, tree_name: &str, ids: IdPolicy) -> Result<Self> {
        let tree = db.open_tree(tree_name)?;
        Ok(Self {
            class: class.into(),
            db: db.clone(),
            tree,
            ids,
        })
    }

    fn next_id(&self) -> Result<u64> {
        // sled ids start at zero, which is reserved for "unassigned".
        Ok(self.db.generate_id()? + 1)
    }
}

impl JobStore for SledJobStore {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn save(&self, job: &JobRecord) -> Result<u64> {
        let id = match self.ids {
            IdPolicy::Preserve => job.id,
            IdPolicy::AssignWhenUnset if job.id != 0 => job.id,
            _ => self.next_id()?,
        };

        let mut stored = job.clone();
        stored.id = id;
        self.tree.insert(id.to_be_bytes(), stored.to_bytes()?)?;
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<Option<JobRecord>> {
        match self.tree.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(JobRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn fetch_batch(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::with_capacity(limit.min(1024));
        for result in self.tree.iter().take(limit) {
            let (_, value) = result?;
            jobs.push(JobRecord::from_bytes(&value)?);
        }
        Ok(jobs)
    }

    fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.tree.remove(id.to_be_bytes())?.is_some())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.tree.len())
    }
}

/// Sled-backed [`JobLogger`].
///
/// Key format: `[job_id:8][sequence:8]`, both big-endian.
pub struct SledJobLogger {
    class: String,
    db: Db,
    tree: Tree,
}

impl SledJobLogger {
    /// Open (or create) the logger's tree.
    pub fn open(db: &Db, class: impl Into<String>, tree_name: &str) -> Result<Self> {
        let tree = db.open_tree(tree_name)?;
        Ok(Self {
            class: class.into(),
            db: db.clone(),
            tree,
        })
    }

    fn entry_key(job_id: u64, seq: u64) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&job_id.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());
        key
    }
}

impl JobLogger for SledJobLogger {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn append(&self, entry: &LogEntry) -> Result<()> {
        let key = Self::entry_key(entry.job_id, self.db.generate_id()?);
        self.tree.insert(key, entry.to_bytes()?)?;
        Ok(())
    }

    fn entries(&self, job_id: u64) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        for result in self.tree.scan_prefix(job_id.to_be_bytes()) {
            let (_, value) = result?;
            entries.push(LogEntry::from_bytes(&value)?);
        }
        Ok(entries)
    }

    fn delete_entries(&self, job_id: u64) -> Result<usize> {
        let mut removed = 0;
        for result in self.tree.scan_prefix(job_id.to_be_bytes()).keys() {
            let key = result?;
            if self.tree.remove(key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
