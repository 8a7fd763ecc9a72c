//! Error types for the runtime crate.

use thiserror::Error;

/// Errors raised by the supervisor itself.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An integration with this name is already registered.
    #[error("integration already registered: {0}")]
    DuplicateTask(String),

    /// The supervisor was started with nothing to run.
    #[error("no integrations registered")]
    NoTasks,

    /// Supervisor already started.
    #[error("supervisor already started")]
    AlreadyStarted,

    /// Supervisor not started.
    #[error("supervisor not started")]
    NotStarted,
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
