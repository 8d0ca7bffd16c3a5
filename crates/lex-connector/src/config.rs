//! Engine configuration loaded from TOML.
//!
//! There is no global instance: callers parse a config (or take the
//! default) and pass it to `ConnectionEngine::open` / `TextTable` loaders.
//! The embedded defaults live in `default_config.toml`.

use std::collections::HashSet;

use serde::Deserialize;

use crate::matrix::ParsePolicy;

pub const DEFAULT_CONFIG_TOML: &str = include_str!("default_config.toml");

/// Returns the embedded default config TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub mmap: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { mmap: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub verify_on_load: bool,
    pub prefetch_rows: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSettings {
    pub strict: bool,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl OracleSettings {
    pub fn parse_policy(&self) -> ParsePolicy {
        if self.strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::SkipMalformed
        }
    }
}

pub fn parse_config_toml(toml_str: &str) -> Result<ConnectorConfig, ConfigError> {
    let config: ConnectorConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConnectorConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    if let Some(dup) = config
        .engine
        .prefetch_rows
        .iter()
        .find(|&&row| !seen.insert(row))
    {
        return Err(ConfigError::InvalidValue {
            field: "engine.prefetch_rows".to_string(),
            reason: format!("row {dup} listed more than once"),
        });
    }
    Ok(())
}
