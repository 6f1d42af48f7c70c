//! Trading fee models.
//!
//! Fees are charged on one-way turnover and returned as a fraction of
//! portfolio value.

use serde::{Deserialize, Serialize};

/// Fee model for rebalancing costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeeModel {
    /// No fees.
    None,
    /// Fixed rate per unit of one-way turnover.
    Turnover(f64),
    /// Rate chosen by turnover size: `(threshold, rate)` sorted by threshold.
    Tiered(Vec<(f64, f64)>),
}

impl Default for FeeModel {
    fn default() -> Self {
        FeeModel::Turnover(0.0008)
    }
}

impl FeeModel {
    /// Create a turnover fee model.
    pub fn turnover(rate: f64) -> Self {
        FeeModel::Turnover(rate)
    }

    /// Fee for `turnover` (fraction of portfolio traded one way).
    pub fn calculate(&self, turnover: f64) -> f64 {
        let turnover = turnover.abs();

        match self {
            FeeModel::None => 0.0,
            FeeModel::Turnover(rate) => turnover * rate,
            FeeModel::Tiered(tiers) => {
                let mut applicable_rate = 0.0;
                for (threshold, rate) in tiers {
                    if turnover >= *threshold {
                        applicable_rate = *rate;
                    } else {
                        break;
                    }
                }
                turnover * applicable_rate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turnover_fee() {
        let fee = FeeModel::turnover(0.0008);
        // Full rotation out of reserve
        assert!((fee.calculate(1.0) - 0.0008).abs() < 1e-12);
        assert!((fee.calculate(0.25) - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn test_tiered_fee() {
        let fee = FeeModel::Tiered(vec![(0.0, 0.001), (0.5, 0.0005)]);
        assert!((fee.calculate(0.2) - 0.0002).abs() < 1e-12);
        assert!((fee.calculate(0.8) - 0.0004).abs() < 1e-12);
    }

    #[test]
    fn test_no_fee() {
        assert_eq!(FeeModel::None.calculate(1.0), 0.0);
    }
}
