//! Configuration schema types.
//!
//! Every section rejects unknown keys and fills missing keys with defaults.

use conduit_middleware::{ContentTypeMatch, DecoderConfig, APPLICATION_JSON};
use conduit_server::{ContainerConfig, DEFAULT_MAX_CONCURRENT};
use conduit_telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// JSON decoder settings.
///
/// # Example
///
/// ```
/// use conduit_config::DecoderSection;
///
/// let section = DecoderSection {
///     content_types: vec!["application/json".into(), "application/vnd.api+json".into()],
///     ignore_content_type: false,
///     max_payload_size: Some(1 << 20),
/// };
/// let decoder = section.to_decoder_config().unwrap();
/// assert_eq!(decoder.max_payload_size, Some(1 << 20));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DecoderSection {
    /// Media types the decoder accepts.
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,

    /// Decode regardless of the message's content type.
    #[serde(default)]
    pub ignore_content_type: bool,

    /// Largest payload, in bytes, the decoder will parse.
    #[serde(default)]
    pub max_payload_size: Option<usize>,
}

impl Default for DecoderSection {
    fn default() -> Self {
        Self {
            content_types: default_content_types(),
            ignore_content_type: false,
            max_payload_size: None,
        }
    }
}

impl DecoderSection {
    /// Builds the decoder configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `content_types` is empty or
    /// holds something that is not a `type/subtype` media type.
    pub fn to_decoder_config(&self) -> Result<DecoderConfig, ConfigError> {
        let matcher = ContentTypeMatch::new(self.content_types.iter().map(String::as_str))
            .map_err(|e| ConfigError::invalid_value("decoder.content_types", e.to_string()))?;

        let mut config = DecoderConfig::new()
            .with_content_type_match(matcher)
            .with_ignore_content_type(self.ignore_content_type);
        if let Some(limit) = self.max_payload_size {
            config = config.with_max_payload_size(limit);
        }
        Ok(config)
    }
}

fn default_content_types() -> Vec<String> {
    vec![APPLICATION_JSON.to_string()]
}

/// Route consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConsumerSection {
    /// Deliveries a route processes at once, unless the route overrides it.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Seconds shutdown waits for in-flight deliveries.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ConsumerSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ConsumerSection {
    /// Builds the container configuration.
    #[must_use]
    pub fn to_container_config(&self) -> ContainerConfig {
        ContainerConfig::default()
            .with_max_concurrent(self.max_concurrent)
            .with_shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
    }
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_shutdown_timeout() -> u64 {
    30
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `conduit_server=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line in log records.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

impl LoggingSection {
    /// Builds the logging configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            file_line_info: self.include_location,
            ..base
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_section_defaults() {
        let section = DecoderSection::default();
        assert_eq!(section.content_types, vec!["application/json"]);
        assert_eq!(section.to_decoder_config().unwrap(), DecoderConfig::default());
    }

    #[test]
    fn test_decoder_section_rejects_bad_media_type() {
        let section = DecoderSection {
            content_types: vec!["json".to_string()],
            ..DecoderSection::default()
        };
        let err = section.to_decoder_config().unwrap_err();
        assert!(err.to_string().contains("decoder.content_types"));
    }

    #[test]
    fn test_decoder_section_rejects_empty_list() {
        let section = DecoderSection {
            content_types: Vec::new(),
            ..DecoderSection::default()
        };
        assert!(section.to_decoder_config().is_err());
    }

    #[test]
    fn test_consumer_section_to_container_config() {
        let section = ConsumerSection {
            max_concurrent: 4,
            shutdown_timeout_secs: 5,
        };
        let config = section.to_container_config();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_logging_section_to_log_config() {
        let section = LoggingSection {
            format: LogFormat::Pretty,
            level: "debug".to_string(),
            ..LoggingSection::default()
        };
        let config = section.to_log_config();
        assert!(!config.json_format);
        assert_eq!(config.level, "debug");
        assert!(!config.file_line_info);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<DecoderSection, _> = toml::from_str("content_type = 'application/json'");
        assert!(result.is_err());
    }
}
