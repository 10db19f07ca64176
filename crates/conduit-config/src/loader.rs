//! Layered configuration loading.
//!
//! Layers apply in order, later layers overriding earlier ones:
//! 1. Built-in defaults (or a preset)
//! 2. A TOML or JSON file
//! 3. A `.env` file, which only feeds the process environment
//! 4. `PREFIX__SECTION__KEY` environment variables

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConduitConfig, ConfigError, LogFormat};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use conduit_config::ConfigLoader;
///
/// # fn main() -> Result<(), conduit_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("conduit.toml")?
///     .with_dotenv()?
///     .with_env_prefix("CONDUIT")
///     .load()?;
///
/// println!("decoding {:?}", config.decoder.content_types);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: ConduitConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the built-in defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ConduitConfig::default();
        self
    }

    /// Resets to the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ConduitConfig::development();
        self
    }

    /// Resets to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ConduitConfig::production();
        self
    }

    /// Loads a file. The format follows the extension (`.toml` or `.json`).
    ///
    /// The file replaces the current layer; sections and keys it omits take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable, has an
    /// unsupported extension, or does not parse (unknown keys included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in the named format (`"toml"` or `"json"`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown format or unparsable text.
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(r#"{"consumer": {"max_concurrent": 2}}"#, "json")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.consumer.max_concurrent, 2);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides at [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads `.env` from the current directory or its parents, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DotenvError`] if a `.env` file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a specific env file into the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DotenvError`] if the file is missing or malformed.
    pub fn with_dotenv_path<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override does not parse or the result is invalid.
    pub fn load(mut self) -> Result<ConduitConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ConduitConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
        let parts: Vec<&str> = path.split("__").collect();

        let decoder = &mut self.config.decoder;
        let consumer = &mut self.config.consumer;
        let logging = &mut self.config.telemetry.logging;

        match parts.as_slice() {
            ["DECODER", "CONTENT_TYPES"] => {
                decoder.content_types = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["DECODER", "IGNORE_CONTENT_TYPE"] => {
                decoder.ignore_content_type = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["DECODER", "MAX_PAYLOAD_SIZE"] => {
                decoder.max_payload_size = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        ConfigError::env_parse_error(key, "expected integer or 'none'")
                    })?)
                };
            }
            ["CONSUMER", "MAX_CONCURRENT"] => {
                consumer.max_concurrent = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["CONSUMER", "SHUTDOWN_TIMEOUT_SECS"] => {
                consumer.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            // Unrecognized keys are left for other consumers of the prefix.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<ConduitConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().with_defaults().load().unwrap();
        assert_eq!(config, ConduitConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let dev = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);

        let prod = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(prod.telemetry.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_with_string_toml() {
        let config = ConfigLoader::new()
            .with_string(
                r#"
                [decoder]
                content_types = ["application/json", "application/vnd.api+json"]
                max_payload_size = 4096
                "#,
                "toml",
            )
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.decoder.content_types.len(), 2);
        assert_eq!(config.decoder.max_payload_size, Some(4096));
        assert_eq!(config.consumer.max_concurrent, 16);
    }

    #[test]
    fn test_with_string_unknown_format() {
        let err = ConfigLoader::new().with_string("", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(f) if f == "yaml"));
    }

    #[test]
    fn test_with_file_toml_and_json() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "[consumer]\nmax_concurrent = 3").unwrap();
        let config = ConfigLoader::new().with_file(toml_file.path()).unwrap().load().unwrap();
        assert_eq!(config.consumer.max_concurrent, 3);

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, r#"{{"decoder": {{"ignore_content_type": true}}}}"#).unwrap();
        let config = ConfigLoader::new().with_file(json_file.path()).unwrap().load().unwrap();
        assert!(config.decoder.ignore_content_type);
    }

    #[test]
    fn test_with_file_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/conduit.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_with_optional_file_missing_keeps_defaults() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/conduit.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, ConduitConfig::default());
    }

    #[test]
    fn test_file_with_invalid_values_fails_load() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[decoder]\ncontent_types = []").unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_apply_env_var_decoder() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("T__DECODER__CONTENT_TYPES", "application/json, text/*", "T")
            .unwrap();
        loader
            .apply_env_var("T__DECODER__IGNORE_CONTENT_TYPE", "yes", "T")
            .unwrap();
        loader
            .apply_env_var("T__DECODER__MAX_PAYLOAD_SIZE", "1024", "T")
            .unwrap();

        let decoder = &loader.config.decoder;
        assert_eq!(decoder.content_types, vec!["application/json", "text/*"]);
        assert!(decoder.ignore_content_type);
        assert_eq!(decoder.max_payload_size, Some(1024));

        loader
            .apply_env_var("T__DECODER__MAX_PAYLOAD_SIZE", "none", "T")
            .unwrap();
        assert_eq!(loader.config.decoder.max_payload_size, None);
    }

    #[test]
    fn test_apply_env_var_consumer_and_logging() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__CONSUMER__MAX_CONCURRENT", "8", "T").unwrap();
        loader.apply_env_var("T__TELEMETRY__LOGGING__FORMAT", "Pretty", "T").unwrap();
        loader.apply_env_var("T__TELEMETRY__LOGGING__LEVEL", "debug", "T").unwrap();

        assert_eq!(loader.config.consumer.max_concurrent, 8);
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(loader.config.telemetry.logging.level, "debug");
    }

    #[test]
    fn test_apply_env_var_rejects_bad_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_env_var("T__CONSUMER__MAX_CONCURRENT", "many", "T").is_err());
        assert!(loader.apply_env_var("T__DECODER__IGNORE_CONTENT_TYPE", "maybe", "T").is_err());
        assert!(loader.apply_env_var("T__TELEMETRY__LOGGING__FORMAT", "xml", "T").is_err());
    }

    #[test]
    fn test_apply_env_var_ignores_unknown_keys() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__BROKER__URL", "amqp://localhost", "T").unwrap();
        assert_eq!(loader.config, ConduitConfig::default());
    }

    #[test]
    fn test_dotenv_file_feeds_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CONDUIT_DOTENV_TEST__CONSUMER__MAX_CONCURRENT=5").unwrap();
        writeln!(file, "CONDUIT_DOTENV_TEST__DECODER__IGNORE_CONTENT_TYPE=true").unwrap();

        let config = ConfigLoader::new()
            .with_dotenv_path(file.path())
            .unwrap()
            .with_env_prefix("conduit_dotenv_test")
            .load()
            .unwrap();

        assert_eq!(config.consumer.max_concurrent, 5);
        assert!(config.decoder.ignore_content_type);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }
}
