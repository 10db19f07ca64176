//! Structured logging for Conduit consumers.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either a
//! JSON formatter (production) or a pretty formatter (development). Everything
//! else in the workspace logs through plain `tracing` macros, using the field
//! names in [`fields`] so that deliveries can be correlated across stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(route = "orders.*", "route ready");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. `"info"`, `"conduit_server=debug,info"`).
    pub level: String,

    /// Whether to output JSON.
    pub json_format: bool,

    /// Whether to emit span open/close events.
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at `debug`.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

/// Initializes the global logging subscriber.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad filter directive and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(level = %config.level, json = config.json_format, "logging initialized");
    Ok(())
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the directive does not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Standard log field names.
pub mod fields {
    /// Delivery ID of the message being processed.
    pub const DELIVERY_ID: &str = "delivery_id";

    /// Route pattern the delivery arrived on.
    pub const ROUTE: &str = "route";

    /// Queue bound for the route.
    pub const QUEUE: &str = "queue";

    /// Routing key of the message.
    pub const ROUTING_KEY: &str = "routing_key";

    /// Name of the stage involved.
    pub const STAGE: &str = "stage";

    /// Decoder outcome.
    pub const OUTCOME: &str = "outcome";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error text.
    pub const ERROR: &str = "error";
}
