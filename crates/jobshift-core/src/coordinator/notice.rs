//! Operator-facing migration notice.

/// Screens that show the notice unless configured otherwise.
pub const DEFAULT_NOTICE_SCREENS: [&str; 2] = ["tools.scheduled-jobs", "status.scheduled-jobs"];

const MIGRATION_IN_PROGRESS: &str =
    "Scheduled job migration in progress. The list of scheduled jobs may be incomplete.";

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// A static advisory shown on operator screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: &'static str,
}

impl Notice {
    /// The "migration in progress" advisory.
    pub fn migration_in_progress() -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: MIGRATION_IN_PROGRESS,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Warning => write!(f, "warning: {}", self.message),
        }
    }
}
