//! Backend class names and the sled trees behind them.
//!
//! Hosts select backends by class name. The coordinator compares and returns
//! these names; [`BackendRegistry`](super::BackendRegistry) turns them into
//! instances.

/// Legacy store: jobs kept as generic records in shared tables.
pub const LEGACY_STORE: &str = "LegacyStore";

/// Legacy logger paired with [`LEGACY_STORE`].
pub const LEGACY_LOGGER: &str = "LegacyLogger";

/// The class a host requests when it never customized its store.
///
/// This is the legacy store: an untouched host asks for the legacy default.
pub const DEFAULT_STORE_MARKER: &str = LEGACY_STORE;

/// The class a host requests when it never customized its logger.
pub const DEFAULT_LOGGER_MARKER: &str = LEGACY_LOGGER;

/// Store spanning legacy and canonical storage during the migration window.
pub const HYBRID_STORE: &str = "HybridStore";

/// Canonical, dedicated job store. Authoritative after migration.
pub const CANONICAL_STORE: &str = "DBStore";

/// Canonical, table-backed job logger.
pub const CANONICAL_LOGGER: &str = "DBLogger";

/// Migration-capable variant of [`CANONICAL_STORE`] that keeps source ids.
pub const MIGRATION_STORE: &str = "DBStoreMigrator";

/// Tree holding legacy job records.
pub const LEGACY_STORE_TREE: &str = "legacy:jobs";

/// Tree holding legacy log entries.
pub const LEGACY_LOG_TREE: &str = "legacy:logs";

/// Tree holding canonical job records.
pub const CANONICAL_STORE_TREE: &str = "jobs:store";

/// Tree holding canonical log entries.
pub const CANONICAL_LOG_TREE: &str = "jobs:logs";

/// Trees that must exist before migration can run.
pub const CANONICAL_TREES: [&str; 2] = [CANONICAL_STORE_TREE, CANONICAL_LOG_TREE];
