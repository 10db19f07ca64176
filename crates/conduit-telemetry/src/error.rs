//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur during telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Invalid log filter directive.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive string.
        filter: String,
        /// Parser message.
        reason: String,
    },
}
