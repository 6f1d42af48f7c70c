//! End-of-run summary aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::drawdown::DrawdownTracker;
use super::streaming::ReturnStats;
use crate::core::config::MINUTES_PER_DAY;
use crate::core::types::{CycleResult, Regime};

/// Aggregate over a run's cycle results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Cycles completed.
    pub cycles: usize,
    pub starting_capital: f64,
    pub final_value: f64,
    /// Total calibrated return as percentage.
    pub total_return_pct: f64,
    /// Maximum drawdown of portfolio value as percentage.
    pub max_drawdown_pct: f64,
    /// Longest run of cycles spent below a previous peak value.
    pub max_drawdown_cycles: usize,
    /// Cycles spent in protection mode.
    pub protection_active_cycles: usize,
    /// Execution costs paid, in currency.
    pub total_cost: f64,
    /// Annualized Sharpe ratio of calibrated returns.
    pub sharpe_ratio: f64,
    /// Fraction of cycles with a positive calibrated return.
    pub win_rate: f64,
    /// Cycles with a negative calibrated return.
    pub losing_cycles: usize,
    /// Best single calibrated cycle return as percentage.
    pub best_cycle_return_pct: f64,
    /// Worst single calibrated cycle return as percentage.
    pub worst_cycle_return_pct: f64,
    /// Cycles in which the allocation changed.
    pub rebalances: usize,
    /// Cycles per regime.
    pub regime_counts: BTreeMap<Regime, usize>,
    /// Protection mode changes.
    pub transitions: usize,
}

impl SimulationSummary {
    /// Summarise `cycles` for a run that started with `starting_capital`.
    pub fn from_cycles(
        starting_capital: f64,
        cycles: &[CycleResult],
        transitions: usize,
        cycle_length_minutes: u32,
    ) -> Self {
        let mut drawdown = DrawdownTracker::with_initial(starting_capital);
        let mut stats = ReturnStats::new();
        let mut regime_counts = BTreeMap::new();
        let mut total_cost = 0.0;
        let mut previous_value = starting_capital;

        for cycle in cycles {
            drawdown.update(cycle.portfolio_value);
            stats.update(cycle.calibrated_return);
            *regime_counts.entry(cycle.regime).or_insert(0) += 1;
            total_cost += cycle.cost * previous_value;
            previous_value = cycle.portfolio_value;
        }

        let final_value = cycles
            .last()
            .map_or(starting_capital, |c| c.portfolio_value);
        let total_return_pct = if starting_capital > 0.0 {
            (final_value / starting_capital - 1.0) * 100.0
        } else {
            0.0
        };
        let periods_per_year =
            365.0 * MINUTES_PER_DAY as f64 / cycle_length_minutes.max(1) as f64;

        Self {
            cycles: cycles.len(),
            starting_capital,
            final_value,
            total_return_pct,
            max_drawdown_pct: drawdown.max_drawdown_pct(),
            max_drawdown_cycles: drawdown.max_duration(),
            protection_active_cycles: cycles.iter().filter(|c| c.protection_active).count(),
            total_cost,
            sharpe_ratio: stats.sharpe_ratio(periods_per_year),
            win_rate: stats.win_rate(),
            losing_cycles: stats.count_negative(),
            best_cycle_return_pct: stats.best() * 100.0,
            worst_cycle_return_pct: stats.worst() * 100.0,
            rebalances: cycles.iter().filter(|c| c.rebalanced).count(),
            regime_counts,
            transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AllocationPlan;
    use chrono::NaiveDate;

    fn cycle(i: usize, value: f64, calibrated: f64, cost: f64, protected: bool) -> CycleResult {
        CycleResult {
            cycle_index: i,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
            regime: if protected { Regime::Bear } else { Regime::Sideways },
            selected_coins: vec!["BTC".to_string(), "ETH".to_string()],
            excluded_coins: vec![],
            allocation: AllocationPlan::all_reserve(),
            reserve_symbol: "USDC".to_string(),
            rebalanced: i == 0,
            gross_return: calibrated,
            cost,
            raw_return: calibrated,
            calibrated_return: calibrated,
            portfolio_value: value,
            protection_active: protected,
        }
    }

    #[test]
    fn test_summary() {
        let cycles = vec![
            cycle(0, 1_100.0, 0.10, 0.001, false),
            cycle(1, 990.0, -0.10, 0.0, true),
            cycle(2, 1_089.0, 0.10, 0.0, true),
        ];
        let summary = SimulationSummary::from_cycles(1_000.0, &cycles, 1, 1440);

        assert_eq!(summary.cycles, 3);
        assert!((summary.total_return_pct - 8.9).abs() < 1e-9);
        assert!((summary.max_drawdown_pct - 10.0).abs() < 1e-9);
        assert_eq!(summary.protection_active_cycles, 2);
        assert!((summary.total_cost - 1.0).abs() < 1e-9);
        assert_eq!(summary.regime_counts[&Regime::Bear], 2);
        assert_eq!(summary.rebalances, 1);
        assert!((summary.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.losing_cycles, 1);
        assert!((summary.best_cycle_return_pct - 10.0).abs() < 1e-9);
        assert!((summary.worst_cycle_return_pct + 10.0).abs() < 1e-9);
        // 990 and 1089 both sit below the 1100 peak
        assert_eq!(summary.max_drawdown_cycles, 2);
    }

    #[test]
    fn test_empty_run() {
        let summary = SimulationSummary::from_cycles(1_000.0, &[], 0, 1440);
        assert_eq!(summary.final_value, 1_000.0);
        assert_eq!(summary.total_return_pct, 0.0);
        assert_eq!(summary.max_drawdown_pct, 0.0);
        assert_eq!(summary.max_drawdown_cycles, 0);
        assert_eq!(summary.best_cycle_return_pct, 0.0);
        assert_eq!(summary.losing_cycles, 0);
    }
}
