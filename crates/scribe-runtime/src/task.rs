//! Integration tasks and their lifecycle states.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

/// Lifecycle state of a supervised integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// The integration is being built.
    Starting,
    /// Poll cycles are running.
    Running,
    /// Waiting out a rate limit.
    Backoff {
        /// Why the task backed off.
        reason: String,
        /// When polling resumes.
        retry_at: Instant,
    },
    /// Waiting to rebuild after a crash.
    Restarting {
        /// Consecutive restart number, starting at 1.
        attempt: u32,
    },
    /// Gave up; siblings keep running.
    Failed {
        /// Why the task failed.
        reason: String,
    },
    /// Stopped on shutdown.
    Stopped,
}

impl TaskState {
    /// Returns true if the task will not run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Failed { .. } | TaskState::Stopped)
    }

    /// Returns true if the task failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskState::Failed { .. })
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Starting => write!(f, "starting"),
            TaskState::Running => write!(f, "running"),
            TaskState::Backoff { reason, .. } => write!(f, "backoff ({})", reason),
            TaskState::Restarting { attempt } => write!(f, "restarting (attempt {})", attempt),
            TaskState::Failed { reason } => write!(f, "failed ({})", reason),
            TaskState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a poll cycle went wrong, which decides what the supervisor does next.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The platform or AI service asked us to slow down.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Description for logs and task state.
        reason: String,
        /// Reset time reported by the API, if any.
        reset_at: Option<Instant>,
    },

    /// Retry on the next cycle.
    #[error("transient error: {0}")]
    Transient(String),

    /// The task cannot continue, for example rejected credentials.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Something unexpected; the integration is rebuilt.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// A long-running platform integration driven by the supervisor.
///
/// The supervisor calls [`poll_cycle`](Self::poll_cycle) repeatedly,
/// sleeping [`poll_interval`](Self::poll_interval) between successful
/// cycles. A cycle may be dropped at any await point on shutdown.
#[async_trait]
pub trait Integration: Send {
    /// Name used in logs and the state map.
    fn name(&self) -> &str;

    /// Delay between cycles.
    fn poll_interval(&self) -> Duration;

    /// Runs one poll cycle.
    async fn poll_cycle(&mut self) -> Result<(), CycleError>;
}

/// Builds a fresh integration, used on start and after every crash.
pub type IntegrationFactory =
    Box<dyn Fn() -> Result<Box<dyn Integration>, CycleError> + Send + Sync>;
