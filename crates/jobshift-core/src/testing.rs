//! In-memory scheduler for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::migration::{MigrationScheduler, MigrationStep};

#[derive(Default)]
pub(crate) struct FakeScheduler {
    pub complete: AtomicBool,
    pub scheduled: AtomicBool,
    pub dependencies: AtomicBool,
    pub schedule_calls: AtomicUsize,
    pub enqueued: AtomicUsize,
    pub hook_activations: AtomicUsize,
    pub step: Mutex<Option<MigrationStep>>,
}

impl FakeScheduler {
    /// Dependencies met, nothing scheduled.
    pub fn ready() -> Arc<Self> {
        let scheduler = Self::default();
        scheduler.dependencies.store(true, Ordering::SeqCst);
        Arc::new(scheduler)
    }

    /// Dependencies missing.
    pub fn missing_dependencies() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Run the step handed over by the last hook activation.
    pub fn run_step(&self) -> Result<Option<usize>> {
        let step = self.step.lock().clone();
        match step {
            Some(step) => step(),
            None => Ok(None),
        }
    }
}

impl MigrationScheduler for FakeScheduler {
    fn is_complete(&self) -> Result<bool> {
        Ok(self.complete.load(Ordering::SeqCst))
    }

    fn is_scheduled(&self) -> Result<bool> {
        Ok(self.scheduled.load(Ordering::SeqCst) && !self.complete.load(Ordering::SeqCst))
    }

    fn dependencies_met(&self) -> Result<bool> {
        Ok(self.dependencies.load(Ordering::SeqCst))
    }

    fn schedule_migration(&self) -> Result<bool> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn activate_hooks(&self, step: MigrationStep) -> Result<()> {
        self.hook_activations.fetch_add(1, Ordering::SeqCst);
        *self.step.lock() = Some(step);
        Ok(())
    }

    fn mark_complete(&self) -> Result<()> {
        self.complete();
        Ok(())
    }
}
