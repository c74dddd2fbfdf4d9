//! Job and log records as stored by every backend.

use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorError, Result};

/// A scheduled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job ID. Zero means "not yet assigned".
    pub id: u64,
    /// Hook fired when the job runs.
    pub hook: String,
    /// Arguments passed to the hook.
    pub args: serde_json::Value,
    /// When the job is due (microseconds since epoch).
    pub scheduled_for: u64,
    /// Optional group the job belongs to.
    pub group: Option<String>,
}

impl JobRecord {
    /// Create an unsaved job for a hook.
    pub fn new(hook: impl Into<String>, scheduled_for: u64) -> Self {
        Self {
            id: 0,
            hook: hook.into(),
            args: serde_json::Value::Null,
            scheduled_for,
            group: None,
        }
    }

    /// Set the job ID.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Set the hook arguments.
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoordinatorError::Deserialization(e.to_string()))
    }
}

/// A log line attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The job this entry belongs to.
    pub job_id: u64,
    /// Log message.
    pub message: String,
    /// When the entry was written (microseconds since epoch).
    pub logged_at: u64,
}

impl LogEntry {
    /// Create a log entry stamped with the current time.
    pub fn new(job_id: u64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            message: message.into(),
            logged_at: current_timestamp(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoordinatorError::Deserialization(e.to_string()))
    }
}

/// Get the current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
