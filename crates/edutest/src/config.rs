//! Toolkit configuration (edutest.toml)
//!
//! ```toml
//! locale = "fi"
//!
//! [time_limit]
//! default_seconds = 2.5
//! mode = "user"
//! poll_interval_ms = 500
//! ```

use crate::locale::{self, Locale};
use crate::timing::{CpuTimeLimit, StopwatchMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "EDUTEST_CONFIG";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EduConfig {
    /// Locale for diagnostic messages (`LANG[_COUNTRY[_VARIANT]]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// CPU time limit settings
    #[serde(default)]
    pub time_limit: TimeLimitConfig,
}

/// `[time_limit]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimeLimitConfig {
    /// Budget every run starts with; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_seconds: Option<f64>,

    /// Which CPU time counts
    #[serde(default)]
    pub mode: StopwatchMode,

    /// Milliseconds between checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for TimeLimitConfig {
    fn default() -> Self {
        Self {
            default_seconds: None,
            mode: StopwatchMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl EduConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EduConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `EDUTEST_CONFIG`, or the defaults if unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(locale) = &self.locale {
            locale.parse::<Locale>().map_err(|e| {
                ConfigError::Validation(format!("locale: {}", e))
            })?;
        }
        if let Some(seconds) = self.time_limit.default_seconds {
            if seconds.is_nan() || seconds < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "time_limit.default_seconds must be non-negative, got {}",
                    seconds
                )));
            }
        }
        if self.time_limit.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "time_limit.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured locale, parsed
    pub fn parsed_locale(&self) -> Result<Option<Locale>, ConfigError> {
        self.locale
            .as_deref()
            .map(|s| s.parse().map_err(|e| ConfigError::Validation(format!("locale: {}", e))))
            .transpose()
    }

    /// Set the process locale, if one is configured
    pub fn apply(&self) -> Result<(), ConfigError> {
        if let Some(locale) = self.parsed_locale()? {
            locale::set(locale);
        }
        Ok(())
    }

    /// A time limit built from the `[time_limit]` section
    pub fn time_limit(&self) -> CpuTimeLimit {
        CpuTimeLimit::from_config(&self.time_limit)
    }
}
