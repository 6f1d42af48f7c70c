//! Core data types for RebalBT.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Type alias for price values.
pub type Price = f64;

/// Type alias for asset symbols ("BTC", "ETH", ...).
pub type Symbol = String;

/// Tolerance used when checking that weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Classified market condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Regime {
    Bull,
    Bear,
    Volatile,
    Sideways,
}

impl Default for Regime {
    fn default() -> Self {
        Regime::Sideways
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Volatile => "volatile",
            Regime::Sideways => "sideways",
        };
        f.write_str(label)
    }
}

/// Target weights for one cycle.
///
/// Risk-asset weights are keyed by symbol in lexical order so that the plan
/// serialises identically across runs. `reserve` is the stable-asset slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Risk-asset weights.
    pub weights: BTreeMap<Symbol, f64>,
    /// Stable/reserve asset weight.
    pub reserve: f64,
}

impl AllocationPlan {
    /// Plan holding everything in the reserve asset.
    pub fn all_reserve() -> Self {
        Self {
            weights: BTreeMap::new(),
            reserve: 1.0,
        }
    }

    /// Weight of `symbol` (zero if absent).
    #[inline]
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Sum of risk-asset weights.
    pub fn risk_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Sum of all weights including the reserve slot.
    pub fn total(&self) -> f64 {
        self.risk_weight() + self.reserve
    }

    /// Whether all weights are finite, non-negative, and sum to one within `eps`.
    pub fn is_normalized(&self, eps: f64) -> bool {
        let finite = self.reserve.is_finite()
            && self.reserve >= 0.0
            && self.weights.values().all(|w| w.is_finite() && *w >= 0.0);
        finite && (self.total() - 1.0).abs() <= eps
    }

    /// Symbols with a strictly positive weight.
    pub fn held_symbols(&self) -> impl Iterator<Item = &str> {
        self.weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(s, _)| s.as_str())
    }

    /// One-way turnover between two plans: half the L1 distance, reserve included.
    pub fn turnover(&self, previous: &AllocationPlan) -> f64 {
        let mut distance = (self.reserve - previous.reserve).abs();
        for (symbol, weight) in &self.weights {
            distance += (weight - previous.weight(symbol)).abs();
        }
        for (symbol, weight) in &previous.weights {
            if !self.weights.contains_key(symbol) {
                distance += weight.abs();
            }
        }
        distance / 2.0
    }

    /// Weight added to each symbol relative to `previous` (buys only).
    pub fn increases_from(&self, previous: &AllocationPlan) -> BTreeMap<Symbol, f64> {
        self.weights
            .iter()
            .filter_map(|(symbol, weight)| {
                let delta = weight - previous.weight(symbol);
                (delta > 0.0).then(|| (symbol.clone(), delta))
            })
            .collect()
    }
}

/// Record emitted once per simulated cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// Zero-based cycle number.
    pub cycle_index: usize,
    /// Decision date of the cycle.
    pub date: NaiveDate,
    /// Regime in force.
    pub regime: Regime,
    /// Active universe used this cycle (ranked order).
    pub selected_coins: Vec<Symbol>,
    /// Symbols dropped this cycle because of missing price data.
    pub excluded_coins: Vec<Symbol>,
    /// Allocation held over the cycle.
    pub allocation: AllocationPlan,
    /// Stable asset holding `allocation.reserve`.
    pub reserve_symbol: Symbol,
    /// Whether the allocation was changed this cycle.
    pub rebalanced: bool,
    /// Weighted asset return before costs.
    pub gross_return: f64,
    /// Total execution cost as a fraction of portfolio value.
    pub cost: f64,
    /// Net simulated return (`gross_return - cost`).
    pub raw_return: f64,
    /// Return after the calibration pass.
    pub calibrated_return: f64,
    /// Portfolio value at the end of the cycle.
    pub portfolio_value: f64,
    /// Whether capital protection was active.
    pub protection_active: bool,
}
