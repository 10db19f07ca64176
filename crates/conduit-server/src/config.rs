//! Container settings.

use std::time::Duration;

/// Default number of deliveries a route processes at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Default time [`Container::shutdown`](crate::Container::shutdown) waits for consumers to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings for a [`Container`](crate::Container).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Concurrency limit for routes that do not set their own.
    pub max_concurrent: usize,

    /// How long shutdown waits for in-flight deliveries.
    pub shutdown_timeout: Duration,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ContainerConfig {
    /// Sets the default per-route concurrency limit. Zero is raised to one.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Sets the shutdown drain timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}
