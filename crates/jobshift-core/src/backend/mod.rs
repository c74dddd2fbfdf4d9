//! Job storage backends.
//!
//! The coordinator only deals in class names; this module supplies the
//! concrete stores and loggers those names refer to:
//!
//! | Class | Storage | Role |
//! |-------|---------|------|
//! | `LegacyStore` / `LegacyLogger` | `legacy:*` trees | pre-migration default |
//! | `HybridStore` | both | active during the migration window |
//! | `DBStore` / `DBLogger` | `jobs:*` trees | canonical, authoritative after migration |
//! | `DBStoreMigrator` | `jobs:store` | migration destination, keeps source ids |

pub mod classes;
pub mod hybrid;
pub mod record;
pub mod registry;
pub mod store;

pub use classes::*;
pub use hybrid::HybridStore;
pub use record::{current_timestamp, JobRecord, LogEntry};
pub use registry::{BackendRegistry, LoggerFactory, StoreFactory};
pub use store::{IdPolicy, JobLogger, JobStore, SledJobLogger, SledJobStore};
