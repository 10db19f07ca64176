//! Observability for Conduit consumers.
//!
//! - **Logging**: `tracing-subscriber` setup, JSON or pretty output
//! - **Metrics**: decode and dispatch counters through the `metrics` facade
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! conduit_telemetry::metrics::describe_metrics();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{InFlightGuard, MessageOutcome};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
