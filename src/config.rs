//! Configuration management for cloud-ratelimit.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RateLimitError, Result};
use crate::ratelimit::RateLimiterRegistry;

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "CLOUD_RATELIMIT";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Specs of the form `[version].[service].[operation],[type],[params...]`
    #[serde(default)]
    pub specs: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional YAML file overlaid with
    /// `CLOUD_RATELIMIT_*` environment variables.
    ///
    /// Nested keys use `__`, e.g. `CLOUD_RATELIMIT_LOGGING__LEVEL=debug`.
    /// `CLOUD_RATELIMIT_RATE_LIMITING__SPECS` holds specs separated by `;`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(";")
                    .with_list_parse_key("rate_limiting.specs"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build the rate limiter registry from the configured specs.
    pub fn build_registry(&self) -> Result<Option<RateLimiterRegistry>> {
        RateLimiterRegistry::from_specs(&self.rate_limiting.specs)
    }
}
