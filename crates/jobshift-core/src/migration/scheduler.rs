//! Migration scheduling and persisted migration state.
//!
//! The authoritative migration status lives in sled so every process sharing
//! the database observes the same phase. Transitions are compare-and-swap
//! updates of a single record, which makes scheduling exactly-once even when
//! many requests race to schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rkyv::{Archive, Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::{debug, info};

use super::worker::{MigrationStep, MigrationWorker, DEFAULT_POLL_INTERVAL_MS};

use crate::backend::classes::CANONICAL_TREES;
use crate::backend::current_timestamp;
use crate::error::{CoordinatorError, Result};

/// Owns migration state transitions and background execution.
///
/// The coordinator only observes and nudges; implementations decide what
/// "scheduled" and "complete" mean and must keep `Complete` sticky.
pub trait MigrationScheduler: Send + Sync {
    /// Whether the migration has finished. Once true, stays true.
    fn is_complete(&self) -> Result<bool>;

    /// Whether the migration is enqueued and not yet complete.
    fn is_scheduled(&self) -> Result<bool>;

    /// Whether the structures migration needs (destination schema) exist.
    fn dependencies_met(&self) -> Result<bool>;

    /// Enqueue the background migration.
    ///
    /// Must be idempotent: returns `true` only for the call that actually
    /// enqueued.
    fn schedule_migration(&self) -> Result<bool>;

    /// Wire the scheduler's background execution.
    ///
    /// `step` moves one bounded batch and returns how many jobs it moved, or
    /// `None` once its owner is gone. The scheduler runs it while the
    /// migration is scheduled and marks the migration complete when a step
    /// moves nothing.
    fn activate_hooks(&self, step: MigrationStep) -> Result<()>;

    /// Record that the migration finished.
    fn mark_complete(&self) -> Result<()>;
}

/// Persisted migration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Nothing scheduled yet.
    Pending,
    /// Enqueued, waiting for or running in the background.
    Scheduled,
    /// Finished. Terminal.
    Complete,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationStatus::Pending => write!(f, "pending"),
            MigrationStatus::Scheduled => write!(f, "scheduled"),
            MigrationStatus::Complete => write!(f, "complete"),
        }
    }
}

/// The single persisted migration state record.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct MigrationStateRecord {
    /// Current status.
    pub status: MigrationStatus,
    /// When the migration was scheduled (microseconds since epoch).
    pub scheduled_at: Option<u64>,
    /// When the migration completed (microseconds since epoch).
    pub completed_at: Option<u64>,
}

impl Default for MigrationStateRecord {
    fn default() -> Self {
        Self {
            status: MigrationStatus::Pending,
            scheduled_at: None,
            completed_at: None,
        }
    }
}

impl MigrationStateRecord {
    /// Serialize the record to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| CoordinatorError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // sled values carry no alignment guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::new();
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| CoordinatorError::Deserialization(e.to_string()))
    }
}

/// Called once, by the caller that wins the scheduling race.
pub type EnqueueHook = Arc<dyn Fn() + Send + Sync>;

/// The persisted record plus a sticky completion cache.
///
/// Shared between the scheduler and its background worker.
pub(crate) struct StateCell {
    tree: Tree,
    complete: AtomicBool,
}

impl StateCell {
    const STATE_KEY: &'static [u8] = b"jobs";

    fn new(tree: Tree) -> Self {
        Self {
            tree,
            complete: AtomicBool::new(false),
        }
    }

    /// Load the persisted record. A missing record reads as pending.
    pub(crate) fn load(&self) -> Result<MigrationStateRecord> {
        match self.tree.get(Self::STATE_KEY)? {
            Some(bytes) => MigrationStateRecord::from_bytes(&bytes),
            None => Ok(MigrationStateRecord::default()),
        }
    }

    /// Apply `transition` to the record until the swap lands.
    ///
    /// `transition` returns `None` when no change is needed. The result is
    /// whether this call performed the write.
    fn update<F>(&self, transition: F) -> Result<bool>
    where
        F: Fn(&MigrationStateRecord) -> Option<MigrationStateRecord>,
    {
        loop {
            let current = self.tree.get(Self::STATE_KEY)?;
            let state = match &current {
                Some(bytes) => MigrationStateRecord::from_bytes(bytes)?,
                None => MigrationStateRecord::default(),
            };

            let Some(next) = transition(&state) else {
                return Ok(false);
            };

            match self
                .tree
                .compare_and_swap(Self::STATE_KEY, current.as_ref(), Some(next.to_bytes()?))?
            {
                Ok(()) => {
                    self.tree.flush()?;
                    return Ok(true);
                }
                Err(_) => debug!("migration state changed concurrently, retrying"),
            }
        }
    }

    pub(crate) fn is_complete(&self) -> Result<bool> {
        if self.complete.load(Ordering::Acquire) {
            return Ok(true);
        }
        let complete = self.load()?.status == MigrationStatus::Complete;
        if complete {
            self.complete.store(true, Ordering::Release);
        }
        Ok(complete)
    }

    fn schedule(&self) -> Result<bool> {
        let now = current_timestamp();
        self.update(|state| {
            (state.status == MigrationStatus::Pending).then(|| MigrationStateRecord {
                status: MigrationStatus::Scheduled,
                scheduled_at: Some(now),
                completed_at: None,
            })
        })
    }

    pub(crate) fn mark_complete(&self) -> Result<()> {
        let now = current_timestamp();
        let changed = self.update(|state| {
            (state.status != MigrationStatus::Complete).then(|| MigrationStateRecord {
                status: MigrationStatus::Complete,
                scheduled_at: state.scheduled_at,
                completed_at: Some(now),
            })
        })?;
        self.complete.store(true, Ordering::Release);
        if changed {
            info!("job store migration complete");
        }
        Ok(())
    }
}

/// [`MigrationScheduler`] persisting its state in a sled tree.
///
/// Activating hooks starts a [`MigrationWorker`] that runs one migration
/// batch per poll while the migration is scheduled, and marks it complete
/// once a batch finds the source empty.
pub struct SledMigrationScheduler {
    db: Db,
    state: Arc<StateCell>,
    required_trees: Vec<String>,
    enqueue: Option<EnqueueHook>,
    poll_interval: Duration,
    worker: Mutex<Option<MigrationWorker>>,
}

impl SledMigrationScheduler {
    /// Tree name for migration state.
    pub const TREE_NAME: &'static str = "migration:state";

    /// Open the scheduler over `db`, requiring the canonical job trees.
    pub fn open(db: &Db) -> Result<Self> {
        let tree = db.open_tree(Self::TREE_NAME)?;
        Ok(Self {
            db: db.clone(),
            state: Arc::new(StateCell::new(tree)),
            required_trees: CANONICAL_TREES.iter().map(|t| t.to_string()).collect(),
            enqueue: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            worker: Mutex::new(None),
        })
    }

    /// Replace the set of trees that must exist for dependencies to be met.
    pub fn with_required_trees<I, S>(mut self, trees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_trees = trees.into_iter().map(Into::into).collect();
        self
    }

    /// Set the hook fired when the migration is enqueued.
    pub fn with_enqueue_hook(mut self, hook: EnqueueHook) -> Self {
        self.enqueue = Some(hook);
        self
    }

    /// Set how often the background worker polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create the required trees.
    pub fn install_schema(&self) -> Result<()> {
        for name in &self.required_trees {
            self.db.open_tree(name)?;
        }
        info!(trees = ?self.required_trees, "installed migration schema");
        Ok(())
    }

    /// Whether the background worker is running.
    pub fn hooks_active(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(MigrationWorker::is_running)
            .unwrap_or(false)
    }

    /// Load the persisted record. A missing record reads as pending.
    pub fn state(&self) -> Result<MigrationStateRecord> {
        self.state.load()
    }
}

impl MigrationScheduler for SledMigrationScheduler {
    fn is_complete(&self) -> Result<bool> {
        self.state.is_complete()
    }

    fn is_scheduled(&self) -> Result<bool> {
        Ok(self.state()?.status == MigrationStatus::Scheduled)
    }

    fn dependencies_met(&self) -> Result<bool> {
        let existing = self.db.tree_names();
        Ok(self
            .required_trees
            .iter()
            .all(|name| existing.iter().any(|t| &t[..] == name.as_bytes())))
    }

    fn schedule_migration(&self) -> Result<bool> {
        let enqueued = self.state.schedule()?;

        if enqueued {
            info!("job store migration scheduled");
            if let Some(hook) = &self.enqueue {
                hook();
            }
        } else {
            debug!("job store migration already scheduled or complete");
        }
        Ok(enqueued)
    }

    fn activate_hooks(&self, step: MigrationStep) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(MigrationWorker::is_running) {
            return Ok(());
        }
        if self.state.is_complete()? {
            debug!("migration complete, background worker not started");
            return Ok(());
        }
        *worker = Some(MigrationWorker::start(
            Arc::clone(&self.state),
            step,
            self.poll_interval,
        ));
        debug!(interval = ?self.poll_interval, "migration hooks activated");
        Ok(())
    }

    fn mark_complete(&self) -> Result<()> {
        self.state.mark_complete()
    }
}
