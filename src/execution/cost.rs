//! Per-cycle rebalancing cost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fees::FeeModel;
use super::slippage::{ExecutionDelay, SlippageModel};
use crate::core::config::SimulationConfig;
use crate::core::types::{AllocationPlan, Symbol};

/// Cost breakdown for one rebalance, as fractions of portfolio value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCost {
    /// One-way turnover between the previous and new plan.
    pub turnover: f64,
    pub fees: f64,
    pub slippage: f64,
    /// Late-fill drag on newly bought weight.
    pub delay: f64,
}

impl ExecutionCost {
    #[inline]
    pub fn total(&self) -> f64 {
        self.fees + self.slippage + self.delay
    }
}

/// Fees, slippage and execution delay applied to each rebalance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub fees: FeeModel,
    pub slippage: SlippageModel,
    pub delay: ExecutionDelay,
}

impl CostModel {
    /// Cost model from the configured rates.
    ///
    /// A non-empty `fee_tiers` selects the tiered fee model and a positive
    /// `slippage_volatility_factor` selects volatility-scaled slippage.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let fees = if config.fee_tiers.is_empty() {
            FeeModel::turnover(config.fee_rate)
        } else {
            FeeModel::Tiered(config.fee_tiers.clone())
        };
        let slippage = if config.slippage_volatility_factor > 0.0 {
            SlippageModel::volatility_scaled(config.slippage_rate, config.slippage_volatility_factor)
        } else {
            SlippageModel::percentage(config.slippage_rate)
        };

        Self {
            fees,
            slippage,
            delay: ExecutionDelay::new(config.execution_delay),
        }
    }

    /// Model that charges nothing.
    pub fn frictionless() -> Self {
        Self {
            fees: FeeModel::None,
            slippage: SlippageModel::None,
            delay: ExecutionDelay::new(0.0),
        }
    }

    /// Cost of moving from `previous` to `next`.
    ///
    /// `asset_returns` are the per-symbol returns over the cycle being
    /// entered; `volatility` is the current market volatility.
    pub fn rebalance_cost(
        &self,
        previous: &AllocationPlan,
        next: &AllocationPlan,
        asset_returns: &BTreeMap<Symbol, f64>,
        volatility: f64,
    ) -> ExecutionCost {
        let turnover = next.turnover(previous);
        if turnover <= 0.0 {
            return ExecutionCost::default();
        }

        ExecutionCost {
            turnover,
            fees: self.fees.calculate(turnover),
            slippage: self.slippage.calculate(turnover, volatility),
            delay: self.delay.drag(&next.increases_from(previous), asset_returns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn plan(weights: &[(&str, f64)], reserve: f64) -> AllocationPlan {
        AllocationPlan {
            weights: weights.iter().map(|(s, w)| (s.to_string(), *w)).collect(),
            reserve,
        }
    }

    #[test]
    fn test_no_turnover_no_cost() {
        let model = CostModel::default();
        let p = plan(&[("BTC", 0.5)], 0.5);
        assert_eq!(model.rebalance_cost(&p, &p, &BTreeMap::new(), 0.02).total(), 0.0);
    }

    #[test]
    fn test_cost_breakdown() {
        let model = CostModel {
            fees: FeeModel::turnover(0.0008),
            slippage: SlippageModel::percentage(0.0005),
            delay: ExecutionDelay::new(0.1),
        };
        let next = plan(&[("BTC", 0.25), ("ETH", 0.25)], 0.5);
        let moves: BTreeMap<Symbol, f64> = [("BTC".to_string(), 0.02), ("ETH".to_string(), -0.04)]
            .into_iter()
            .collect();
        let cost = model.rebalance_cost(&AllocationPlan::all_reserve(), &next, &moves, 0.02);

        assert!((cost.turnover - 0.5).abs() < 1e-12);
        assert!((cost.fees - 0.0004).abs() < 1e-12);
        assert!((cost.slippage - 0.00025).abs() < 1e-12);
        // 0.1 * (0.25 * 0.02 + 0.25 * 0.04)
        assert!((cost.delay - 0.0015).abs() < 1e-12);
        assert!((cost.total() - 0.00215).abs() < 1e-12);
    }

    #[test]
    fn test_from_config_selects_models() {
        let mut config = SimulationConfig::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let flat = CostModel::from_config(&config);
        assert_eq!(flat.fees, FeeModel::Turnover(0.0008));
        assert_eq!(flat.slippage, SlippageModel::Percentage(0.0005));

        config.fee_tiers = vec![(0.0, 0.001), (0.5, 0.0005)];
        config.slippage_volatility_factor = 0.01;
        let model = CostModel::from_config(&config);
        assert_eq!(model.fees, FeeModel::Tiered(vec![(0.0, 0.001), (0.5, 0.0005)]));

        let next = plan(&[("BTC", 0.4), ("ETH", 0.4)], 0.2);
        let cost = model.rebalance_cost(&AllocationPlan::all_reserve(), &next, &BTreeMap::new(), 0.05);
        // Turnover 0.8 lands in the cheaper tier
        assert!((cost.fees - 0.8 * 0.0005).abs() < 1e-12);
        // (0.0005 + 0.01 * 0.05) per unit turnover
        assert!((cost.slippage - 0.8 * 0.001).abs() < 1e-12);

        let calm = model.rebalance_cost(&AllocationPlan::all_reserve(), &next, &BTreeMap::new(), 0.0);
        assert!(calm.slippage < cost.slippage);
    }

    #[test]
    fn test_frictionless() {
        let next = plan(&[("BTC", 1.0)], 0.0);
        let cost = CostModel::frictionless().rebalance_cost(
            &AllocationPlan::all_reserve(),
            &next,
            &BTreeMap::new(),
            0.05,
        );
        assert_eq!(cost.total(), 0.0);
        assert!((cost.turnover - 1.0).abs() < 1e-12);
    }
}
