//! Translator configuration
//!
//! Loaded from a YAML file; every field has a default so a partial file (or
//! none at all) is fine. Environment variables override file values, and are
//! only consulted here, never by the passes themselves.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Settings that change the generated HiveQL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Name of the synthetic row-number column used for paging
    pub row_number_column: String,

    /// Match projection members to columns by position when no column has the
    /// member's name. Deprecated; exact name matching is the supported mode.
    pub allow_positional_fallback: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            row_number_column: "rn".to_string(),
            allow_positional_fallback: false,
        }
    }
}

impl TranslatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.row_number_column;
        let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::InvalidValue(format!(
                "row_number_column '{name}' is not a plain identifier"
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific directives
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translator: TranslatorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse YAML text, then apply environment variable overrides
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.apply_env_overrides()?;
        config.translator.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(name) = std::env::var("HQL_ROW_NUMBER_COLUMN") {
            self.translator.row_number_column = name;
        }
        if let Ok(flag) = std::env::var("HQL_ALLOW_POSITIONAL_FALLBACK") {
            self.translator.allow_positional_fallback = parse_flag(&flag)?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "HQL_ALLOW_POSITIONAL_FALLBACK must be a boolean, got '{other}'"
        ))),
    }
}
