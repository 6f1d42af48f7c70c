//! Portfolio state threaded between cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{RebalError, Result};
use crate::core::types::{AllocationPlan, Price, Symbol};

/// Holdings at the end of a cycle.
///
/// Marked at the cycle's closing prices, `cash_reserve + Σ quantity × price`
/// equals the recorded portfolio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Value held in the reserve asset.
    pub cash_reserve: f64,
    /// Quantity held per risk asset.
    pub holdings: BTreeMap<Symbol, f64>,
    /// Cycles completed.
    pub cycle_index: usize,
    /// Set once the run has ended; a frozen state accepts no further cycles.
    pub frozen: bool,
}

impl PortfolioState {
    /// Fresh state with everything in the reserve asset.
    pub fn new(starting_capital: f64) -> Self {
        Self {
            cash_reserve: starting_capital,
            holdings: BTreeMap::new(),
            cycle_index: 0,
            frozen: false,
        }
    }

    /// Mark-to-market value.
    ///
    /// Returns `None` if a held symbol has no price in `prices`.
    pub fn value(&self, prices: &BTreeMap<Symbol, Price>) -> Option<f64> {
        let mut total = self.cash_reserve;
        for (symbol, quantity) in &self.holdings {
            total += quantity * prices.get(symbol)?;
        }
        Some(total)
    }

    /// Current weights implied by holdings at `prices`.
    ///
    /// Returns `None` if a held symbol has no price.
    pub fn allocation(&self, prices: &BTreeMap<Symbol, Price>) -> Option<AllocationPlan> {
        let value = self.value(prices)?;
        if value <= 0.0 {
            return Some(AllocationPlan::all_reserve());
        }

        let mut weights = BTreeMap::new();
        for (symbol, quantity) in &self.holdings {
            if *quantity > 0.0 {
                weights.insert(symbol.clone(), quantity * prices.get(symbol)? / value);
            }
        }
        Some(AllocationPlan {
            weights,
            reserve: self.cash_reserve / value,
        })
    }

    /// Symbols with a non-zero quantity.
    pub fn held_symbols(&self) -> impl Iterator<Item = &str> {
        self.holdings
            .iter()
            .filter(|(_, q)| **q > 0.0)
            .map(|(s, _)| s.as_str())
    }

    /// State after closing a cycle at `value` with `plan` held at `prices`.
    ///
    /// Symbols without a positive price are left out and their weight is
    /// held in the reserve.
    pub fn advance(
        &self,
        plan: &AllocationPlan,
        value: f64,
        prices: &BTreeMap<Symbol, Price>,
    ) -> Result<Self> {
        if self.frozen {
            return Err(RebalError::Frozen {
                cycle_index: self.cycle_index,
            });
        }
        if !value.is_finite() {
            return Err(RebalError::invalid_parameter(format!(
                "portfolio value must be finite, got {}",
                value
            )));
        }

        let mut holdings = BTreeMap::new();
        let mut cash_reserve = value * plan.reserve;
        for (symbol, weight) in &plan.weights {
            match prices.get(symbol) {
                Some(&price) if price > 0.0 => {
                    holdings.insert(symbol.clone(), value * weight / price);
                }
                _ => cash_reserve += value * weight,
            }
        }

        Ok(Self {
            cash_reserve,
            holdings,
            cycle_index: self.cycle_index + 1,
            frozen: false,
        })
    }

    /// Freeze the state at the end of a run.
    pub fn freeze(mut self) -> Self {
        self.frozen = true;
        self
    }
}
