//! Typed configuration for Conduit consumers.
//!
//! - TOML and JSON files
//! - `.env` files via `dotenvy`
//! - `PREFIX__SECTION__KEY` environment overrides
//! - Strict parsing: unknown keys are errors
//!
//! Each section converts into the settings type of the crate it configures:
//! [`DecoderSection::to_decoder_config`], [`ConsumerSection::to_container_config`]
//! and [`LoggingSection::to_log_config`].
//!
//! # Configuration File Format
//!
//! ```toml
//! [decoder]
//! content_types = ["application/json"]
//! ignore_content_type = false
//! max_payload_size = 1048576
//!
//! [consumer]
//! max_concurrent = 16
//! shutdown_timeout_secs = 30
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! include_location = false
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `CONDUIT__DECODER__CONTENT_TYPES=application/json,application/vnd.api+json`
//! - `CONDUIT__DECODER__MAX_PAYLOAD_SIZE=none`
//! - `CONDUIT__CONSUMER__MAX_CONCURRENT=32`
//! - `CONDUIT__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::ConduitConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{ConsumerSection, DecoderSection, LogFormat, LoggingSection, TelemetrySection};
