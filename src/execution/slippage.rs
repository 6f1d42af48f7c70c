//! Slippage and execution-delay models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Symbol;

/// Slippage on rebalancing trades, as a fraction of portfolio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlippageModel {
    /// No slippage.
    None,
    /// Fixed rate per unit of one-way turnover.
    Percentage(f64),
    /// Rate that widens with market volatility: `base + volatility_factor * vol`.
    VolatilityScaled { base: f64, volatility_factor: f64 },
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::None
    }
}

impl SlippageModel {
    /// Create a percentage slippage model.
    pub fn percentage(rate: f64) -> Self {
        SlippageModel::Percentage(rate)
    }

    /// Create a volatility-scaled slippage model.
    pub fn volatility_scaled(base: f64, volatility_factor: f64) -> Self {
        SlippageModel::VolatilityScaled {
            base,
            volatility_factor,
        }
    }

    /// Slippage for `turnover` given the current market `volatility`.
    pub fn calculate(&self, turnover: f64, volatility: f64) -> f64 {
        let turnover = turnover.abs();
        let rate = match self {
            SlippageModel::None => 0.0,
            SlippageModel::Percentage(rate) => *rate,
            SlippageModel::VolatilityScaled {
                base,
                volatility_factor,
            } => {
                let vol = if volatility.is_finite() { volatility.max(0.0) } else { 0.0 };
                base + volatility_factor * vol
            }
        };
        turnover * rate
    }
}

/// Fill delay: newly bought weight misses part of the cycle's move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDelay {
    /// Fraction of the cycle elapsed before orders fill, in [0, 1].
    pub fraction: f64,
}

impl Default for ExecutionDelay {
    fn default() -> Self {
        Self { fraction: 0.1 }
    }
}

impl ExecutionDelay {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// Drag from late fills on `buys` (weight added per symbol).
    ///
    /// Charged on the magnitude of each asset's move, so the delay never
    /// helps.
    pub fn drag(&self, buys: &BTreeMap<Symbol, f64>, asset_returns: &BTreeMap<Symbol, f64>) -> f64 {
        buys.iter()
            .map(|(symbol, added)| {
                let asset_move = asset_returns.get(symbol).copied().unwrap_or(0.0);
                if asset_move.is_finite() {
                    added * asset_move.abs()
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            * self.fraction
    }
}
