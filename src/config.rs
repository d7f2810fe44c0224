//! Pricing configuration
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no file) is valid.

use std::{fs, io, path::Path, time::Duration};

use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    currencies::{CurrencyError, parse_currency},
    exchange::ConversionPolicy,
};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    /// The YAML was malformed or had unknown keys.
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The settlement currency is not supported.
    #[error(transparent)]
    Currency(#[from] CurrencyError),
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Currency grand totals are settled in
    pub settlement_currency: String,

    /// Quiet period before a typed target total is committed, in milliseconds
    pub debounce_ms: u64,

    /// Age after which exchange rates are refetched, in seconds
    pub rate_refresh_secs: u64,

    /// Behaviour when a conversion has no usable rate
    pub conversion_policy: ConversionPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            settlement_currency: "TRY".to_string(),
            debounce_ms: 750,
            rate_refresh_secs: 300,
            conversion_policy: ConversionPolicy::default(),
        }
    }
}

impl PricingConfig {
    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, contains unknown keys, or names an
    /// unsupported settlement currency.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_norway::from_str(yaml)?;

        config.settlement()?;

        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Settlement currency
    ///
    /// # Errors
    ///
    /// Returns an error if the configured code is not supported.
    pub fn settlement(&self) -> Result<&'static Currency, ConfigError> {
        Ok(parse_currency(&self.settlement_currency)?)
    }

    /// Debounce window for target-total edits
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Exchange rate refresh interval
    pub fn rate_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rate_refresh_secs)
    }
}
