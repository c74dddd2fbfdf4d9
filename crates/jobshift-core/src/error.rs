//! Core error types.

use thiserror::Error;

/// Errors raised by the coordinator and its collaborators.
///
/// Nothing here is swallowed: a broken backend or a misconfigured collaborator
/// surfaces to the caller immediately.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// No factory is registered for a backend class.
    #[error("unknown {kind} class: {class}")]
    UnknownBackend {
        /// Backend kind ("store" or "logger").
        kind: &'static str,
        /// The requested class name.
        class: String,
    },

    /// A migration config is missing a required backend.
    #[error("migration config is missing its {missing}")]
    IncompleteConfig {
        /// The missing part of the config.
        missing: &'static str,
    },

    /// A command with the same name was already registered.
    #[error("command already registered: {name}")]
    CommandAlreadyRegistered {
        /// The command name.
        name: String,
    },
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(err: serde_json::Error) -> Self {
        CoordinatorError::Serialization(err.to_string())
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
