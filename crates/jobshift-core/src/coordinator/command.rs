//! Command-line surface: the bulk migration command and its registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use super::MigrationCoordinator;
use crate::error::{CoordinatorError, Result};
use crate::migration::{RunOptions, RunSummary};

/// Name the bulk migration command registers under.
pub const MIGRATE_COMMAND: &str = "jobs migrate";

/// Commands exposed to the host's command line.
#[derive(Default)]
pub struct CommandRegistry {
    commands: DashMap<String, Arc<BulkMigrateCommand>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A name can only be registered once.
    pub fn register(&self, command: BulkMigrateCommand) -> Result<Arc<BulkMigrateCommand>> {
        match self.commands.entry(command.name().to_string()) {
            Entry::Occupied(entry) => Err(CoordinatorError::CommandAlreadyRegistered {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let command = Arc::new(command);
                entry.insert(Arc::clone(&command));
                Ok(command)
            }
        }
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<BulkMigrateCommand>> {
        self.commands.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Whether a command name is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Migrates all scheduled jobs in the foreground.
///
/// Uses the coordinator's default config, so a captured host override is the
/// source and progress is reported when running from a terminal.
pub struct BulkMigrateCommand {
    coordinator: Arc<MigrationCoordinator>,
}

impl BulkMigrateCommand {
    pub(crate) fn new(coordinator: Arc<MigrationCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn name(&self) -> &str {
        MIGRATE_COMMAND
    }

    /// Run the migration.
    pub fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        self.coordinator.run_migration(options)
    }
}
