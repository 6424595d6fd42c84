//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homehub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::BTreeMap;

use serde::Deserialize;

use homehub_core::Configuration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kernel tuning.
    pub hub: HubSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Components to load, keyed by domain; each value is forwarded to
    /// the component's `setup` untouched.
    pub components: BTreeMap<String, toml::Value>,
}

/// Kernel tuning knobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// Worker threads to start with. The pool also grows by one per
    /// loaded device component, so this only needs to cover startup.
    pub initial_workers: usize,
    /// Seconds shutdown waits for in-flight jobs before abandoning them.
    pub shutdown_grace_secs: u64,
    /// Domain whose dependents are treated as coordination-layer
    /// components (they do not earn the pool extra workers).
    pub coordination_domain: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `homehub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homehub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMEHUB_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.hub.initial_workers = workers;
            }
        }
        if let Ok(val) = std::env::var("HOMEHUB_SHUTDOWN_GRACE") {
            if let Ok(secs) = val.parse() {
                self.hub.shutdown_grace_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("HOMEHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.initial_workers == 0 {
            return Err(ConfigError::Validation(
                "initial_workers must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The `[components]` table converted to the JSON mapping handed to
    /// every component `setup`.
    ///
    /// # Errors
    ///
    /// Returns an error when a component section holds values TOML can
    /// express but JSON cannot (datetimes).
    pub fn component_configuration(&self) -> Result<Configuration, ConfigError> {
        let mut configuration = Configuration::new();
        for (domain, value) in &self.components {
            let json = serde_json::to_value(value).map_err(ConfigError::Convert)?;
            configuration.insert(domain.clone(), json);
        }
        Ok(configuration)
    }
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            initial_workers: 2,
            shutdown_grace_secs: 10,
            coordination_domain: "group".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homehubd=info,homehub=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Component section not representable as JSON.
    #[error("failed to convert component configuration")]
    Convert(#[from] serde_json::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.hub.initial_workers, 2);
        assert_eq!(config.hub.shutdown_grace_secs, 10);
        assert_eq!(config.hub.coordination_domain, "group");
        assert!(config.components.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.hub.initial_workers, 2);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [hub]
            initial_workers = 4
            shutdown_grace_secs = 30
            coordination_domain = 'scenes'

            [logging]
            filter = 'debug'

            [components.demo]

            [components.light]
            platform = 'demo'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.initial_workers, 4);
        assert_eq!(config.hub.shutdown_grace_secs, 30);
        assert_eq!(config.hub.coordination_domain, "scenes");
        assert_eq!(config.logging.filter, "debug");
        assert!(config.components.contains_key("demo"));
        assert!(config.components.contains_key("light"));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.hub.initial_workers, 2);
    }

    #[test]
    fn should_reject_zero_workers() {
        let mut config = Config::default();
        config.hub.initial_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_convert_component_sections_to_json() {
        let toml = "
            [components.light]
            platform = 'demo'
            count = 3
        ";
        let config: Config = toml::from_str(toml).unwrap();
        let configuration = config.component_configuration().unwrap();

        let light = configuration.get("light").unwrap();
        assert_eq!(light["platform"], "demo");
        assert_eq!(light["count"], 3);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
