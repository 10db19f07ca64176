//! Top-level configuration.

use conduit_telemetry::logging::create_env_filter;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConsumerSection, DecoderSection, LogFormat, TelemetrySection};

/// All Conduit settings.
///
/// # Example
///
/// ```
/// use conduit_config::ConduitConfig;
///
/// let config: ConduitConfig = toml::from_str(r#"
///     [decoder]
///     ignore_content_type = true
///
///     [consumer]
///     max_concurrent = 4
/// "#).unwrap();
///
/// assert!(config.decoder.ignore_content_type);
/// assert_eq!(config.consumer.max_concurrent, 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConduitConfig {
    /// JSON decoder settings.
    #[serde(default)]
    pub decoder: DecoderSection,

    /// Route consumer settings.
    #[serde(default)]
    pub consumer: ConsumerSection,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl ConduitConfig {
    /// Development preset: pretty `debug` logs with source locations.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config
    }

    /// Production preset: JSON `info` logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config
    }

    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.to_decoder_config()?;

        if self.consumer.max_concurrent == 0 {
            return Err(ConfigError::invalid_value(
                "consumer.max_concurrent",
                "must be at least 1",
            ));
        }

        if self.decoder.max_payload_size == Some(0) {
            return Err(ConfigError::invalid_value(
                "decoder.max_payload_size",
                "must be at least 1 when set",
            ));
        }

        let logging = &self.telemetry.logging;
        if logging.enabled {
            create_env_filter(&logging.level)
                .map_err(|e| ConfigError::invalid_value("telemetry.logging.level", e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ConduitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.consumer.max_concurrent, 16);
        assert_eq!(config.decoder.content_types, vec!["application/json"]);
    }

    #[test]
    fn test_presets() {
        let dev = ConduitConfig::development();
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(dev.telemetry.logging.level, "debug");

        let prod = ConduitConfig::production();
        assert_eq!(prod.telemetry.logging.format, LogFormat::Json);
        assert!(!prod.telemetry.logging.include_location);
    }

    #[test]
    fn test_zero_concurrency_invalid() {
        let mut config = ConduitConfig::default();
        config.consumer.max_concurrent = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("consumer.max_concurrent"));
    }

    #[test]
    fn test_zero_payload_limit_invalid() {
        let mut config = ConduitConfig::default();
        config.decoder.max_payload_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_invalid() {
        let mut config = ConduitConfig::default();
        config.telemetry.logging.level = "conduit=shouty".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("telemetry.logging.level"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<ConduitConfig, _> = toml::from_str("[server]\nport = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = ConduitConfig::development();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[decoder]"));
        let parsed: ConduitConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
