//! Background worker driving a scheduled migration to completion.
//!
//! The worker polls the persisted migration state. While the migration is
//! scheduled it runs one bounded step per tick; the first step that moves
//! nothing marks the migration complete and ends the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::scheduler::{MigrationStatus, StateCell};
use crate::error::Result;

/// Default poll interval of the background worker (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// One bounded migration step.
///
/// Returns the number of jobs moved, or `None` once the owner of the step is
/// gone and the worker should exit.
pub type MigrationStep = Arc<dyn Fn() -> Result<Option<usize>> + Send + Sync>;

/// Background thread running migration steps.
pub struct MigrationWorker {
    /// Shutdown signal.
    shutdown: Arc<AtomicBool>,
    /// Worker thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
}

enum Tick {
    Idle,
    Progress,
    Done,
}

impl MigrationWorker {
    /// Start a worker over `state`, polling every `poll_interval`.
    pub(crate) fn start(state: Arc<StateCell>, step: MigrationStep, poll_interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::worker_loop(state, step, poll_interval, shutdown_clone);
        });

        Self {
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the worker and wait for it to finish.
    ///
    /// Called from the worker thread itself, only signals.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            handle.thread().unpark();
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Check if the worker is still running.
    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn worker_loop(
        state: Arc<StateCell>,
        step: MigrationStep,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        debug!("migration worker started");
        while !shutdown.load(Ordering::SeqCst) {
            match Self::tick(&state, &step) {
                Ok(Tick::Done) => break,
                Ok(Tick::Progress) => continue,
                Ok(Tick::Idle) => {}
                Err(e) => {
                    error!(error = %e, "migration step failed");
                }
            }
            thread::park_timeout(poll_interval);
        }
        debug!("migration worker stopped");
    }

    fn tick(state: &StateCell, step: &MigrationStep) -> Result<Tick> {
        match state.load()?.status {
            MigrationStatus::Pending => Ok(Tick::Idle),
            MigrationStatus::Complete => Ok(Tick::Done),
            MigrationStatus::Scheduled => match step()? {
                None => Ok(Tick::Done),
                Some(0) => {
                    state.mark_complete()?;
                    Ok(Tick::Done)
                }
                Some(moved) => {
                    debug!(moved, "migration step moved jobs");
                    Ok(Tick::Progress)
                }
            },
        }
    }
}

impl Drop for MigrationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
