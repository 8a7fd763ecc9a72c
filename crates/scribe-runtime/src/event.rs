//! Supervisor events.

use crate::task::TaskState;

/// Events broadcast by the supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// A task moved to a new state.
    StateChanged {
        /// Integration name.
        task: String,
        /// New state.
        state: TaskState,
    },
    /// A poll cycle finished without error.
    CycleCompleted {
        /// Integration name.
        task: String,
    },
    /// A poll cycle returned an error or panicked.
    CycleFailed {
        /// Integration name.
        task: String,
        /// Error description.
        error: String,
    },
}

impl SupervisorEvent {
    /// Returns the integration this event concerns.
    pub fn task(&self) -> &str {
        match self {
            SupervisorEvent::StateChanged { task, .. } => task,
            SupervisorEvent::CycleCompleted { task } => task,
            SupervisorEvent::CycleFailed { task, .. } => task,
        }
    }

    /// Returns true if this is a failure event.
    pub fn is_error(&self) -> bool {
        matches!(self, SupervisorEvent::CycleFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_task() {
        let event = SupervisorEvent::StateChanged {
            task: "twitter".to_string(),
            state: TaskState::Running,
        };
        assert_eq!(event.task(), "twitter");
        assert!(!event.is_error());

        let event = SupervisorEvent::CycleFailed {
            task: "telegram".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(event.task(), "telegram");
        assert!(event.is_error());
    }
}
