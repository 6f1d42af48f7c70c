//! Error types for RebalBT.

use thiserror::Error;

/// Result type alias for RebalBT operations.
pub type Result<T> = std::result::Result<T, RebalError>;

/// Error types for the simulation engine.
///
/// Only configuration-level problems are surfaced as errors. Per-cycle data
/// problems (missing prices, short history, degenerate math) are recovered
/// inside the cycle loop and never reach the caller.
#[derive(Error, Debug)]
pub enum RebalError {
    /// Calibration profile name not recognised.
    #[error("Unknown calibration profile: {name}")]
    UnknownProfile { name: String },

    /// Invalid parameter value.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Price series violates ordering or positivity rules.
    #[error("Invalid price series for {symbol}: {message}")]
    InvalidSeries { symbol: String, message: String },

    /// Market data collaborator failed to supply a series.
    #[error("Price source failed for {symbol}: {message}")]
    PriceSource { symbol: String, message: String },

    /// Operation attempted on a frozen portfolio.
    #[error("Portfolio is frozen at cycle {cycle_index}")]
    Frozen { cycle_index: usize },

    /// Configuration file could not be loaded.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// JSON export failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RebalError {
    /// Create an unknown profile error.
    pub fn unknown_profile(name: impl Into<String>) -> Self {
        Self::UnknownProfile { name: name.into() }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid series error.
    pub fn invalid_series(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSeries {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    /// Create a price source error.
    pub fn price_source(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PriceSource {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    /// Whether the error is fatal configuration that must abort before the first cycle.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RebalError::UnknownProfile { .. }
                | RebalError::InvalidConfig { .. }
                | RebalError::ConfigLoad(_)
        )
    }
}
