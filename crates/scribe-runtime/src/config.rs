//! Supervisor configuration.

use std::time::Duration;

/// Configuration for the supervisor and the tasks it runs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Consecutive restarts allowed before a task is failed.
    pub max_restarts: u32,
    /// Delay before the first restart; doubles per consecutive restart.
    pub restart_base_delay: Duration,
    /// Upper bound for the restart delay.
    pub restart_max_delay: Duration,
    /// First rate-limit backoff when the API reports no reset time.
    pub backoff_base: Duration,
    /// Upper bound for rate-limit backoff.
    pub backoff_max: Duration,
    /// Time an in-flight cycle gets to finish on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            restart_base_delay: Duration::from_secs(5),
            restart_max_delay: Duration::from_secs(5 * 60),
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(30 * 60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl SupervisorConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the restart budget.
    pub fn with_max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    /// Sets the base restart delay.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_base_delay = delay;
        self
    }

    /// Sets the rate-limit backoff ladder.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();

        assert_eq!(config.max_restarts, 5);
        assert_eq!(config.restart_base_delay, Duration::from_secs(5));
        assert_eq!(config.backoff_base, Duration::from_secs(60));
        assert_eq!(config.backoff_max, Duration::from_secs(1800));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
    }

    #[test]
    fn test_config_builder() {
        let config = SupervisorConfig::new()
            .with_max_restarts(2)
            .with_restart_delay(Duration::from_millis(10))
            .with_backoff(Duration::from_secs(1), Duration::from_secs(8))
            .with_shutdown_grace(Duration::from_secs(1));

        assert_eq!(config.max_restarts, 2);
        assert_eq!(config.restart_base_delay, Duration::from_millis(10));
        assert_eq!(config.backoff_max, Duration::from_secs(8));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }
}
