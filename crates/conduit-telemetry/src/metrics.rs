//! Dispatch and decode metrics.
//!
//! Recorded through the `metrics` facade. No exporter is installed here; the
//! embedding application picks its own recorder, and until it does every call
//! is a no-op.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `conduit_decode_total` | Counter | `outcome` | Decoder results (`skipped`, `decoded`, `failed`) |
//! | `conduit_messages_total` | Counter | `route`, `outcome` | Deliveries by final outcome |
//! | `conduit_stage_duration_seconds` | Histogram | `route` | Time spent in the stage chain |
//! | `conduit_in_flight_messages` | Gauge | `route` | Deliveries currently being processed |

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Decoder results counter.
pub const DECODE_TOTAL: &str = "conduit_decode_total";

/// Deliveries counter.
pub const MESSAGES_TOTAL: &str = "conduit_messages_total";

/// Stage chain latency histogram.
pub const STAGE_DURATION_SECONDS: &str = "conduit_stage_duration_seconds";

/// In-flight deliveries gauge.
pub const IN_FLIGHT_MESSAGES: &str = "conduit_in_flight_messages";

/// Final outcome of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageOutcome {
    /// The handler completed successfully.
    Handled,
    /// A stage rejected the message; the handler never ran.
    Rejected,
    /// The handler returned an error.
    HandlerFailed,
}

impl MessageOutcome {
    /// Label value for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::Rejected => "rejected",
            Self::HandlerFailed => "handler_failed",
        }
    }
}

/// Registers descriptions for all standard metrics.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(DECODE_TOTAL, "JSON decoder results by outcome");
    describe_counter!(MESSAGES_TOTAL, "Deliveries processed by route and outcome");
    describe_histogram!(
        STAGE_DURATION_SECONDS,
        "Time spent running the stage chain, in seconds"
    );
    describe_gauge!(IN_FLIGHT_MESSAGES, "Deliveries currently being processed");
}

/// Records one decoder result.
///
/// `outcome` is one of `skipped`, `decoded` or `failed`.
pub fn record_decode(outcome: &'static str) {
    counter!(DECODE_TOTAL, "outcome" => outcome).increment(1);
}

/// Records the final outcome of a delivery.
pub fn record_message(route: &str, outcome: MessageOutcome) {
    counter!(
        MESSAGES_TOTAL,
        "route" => route.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Records how long the stage chain took for one delivery.
pub fn record_stage_duration(route: &str, duration: Duration) {
    histogram!(STAGE_DURATION_SECONDS, "route" => route.to_string())
        .record(duration.as_secs_f64());
}

/// Keeps the in-flight gauge raised for one delivery; lowers it on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    route: String,
}

impl InFlightGuard {
    /// Increments the in-flight gauge for `route`.
    #[must_use]
    pub fn new(route: &str) -> Self {
        gauge!(IN_FLIGHT_MESSAGES, "route" => route.to_string()).increment(1.0);
        Self {
            route: route.to_string(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_MESSAGES, "route" => self.route.clone()).decrement(1.0);
    }
}
