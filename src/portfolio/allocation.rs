//! Risk-adjusted position sizing.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{RebalError, Result};
use crate::core::series::PriceHistoryStore;
use crate::core::types::{AllocationPlan, Symbol, WEIGHT_EPSILON};
use crate::indicators::{inverse_volatility, volatility};
use crate::regime::RegimeState;
use crate::signals::Signal;

/// Largest signal-driven change to a base weight (±50%).
pub const MAX_SIGNAL_TILT: f64 = 0.5;

/// Lookback for inverse-volatility weighting.
const VOLATILITY_WINDOW: usize = 7;

/// Base weighting before signal adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseWeighting {
    /// Equal weight across all symbols.
    EqualWeight,
    /// Weight proportional to 1 / 7-day volatility.
    InverseVolatility,
}

impl Default for BaseWeighting {
    fn default() -> Self {
        BaseWeighting::EqualWeight
    }
}

/// Converts signals into a bounded, normalised allocation.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Base weighting.
    pub base: BaseWeighting,
    /// Lower bound for each risk weight.
    pub min_weight: f64,
    /// Upper bound for each risk weight.
    pub max_weight: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            base: BaseWeighting::EqualWeight,
            min_weight: 0.02,
            max_weight: 0.25,
        }
    }
}

impl PositionSizer {
    /// Create a sizer with the given weight bounds.
    pub fn new(min_weight: f64, max_weight: f64) -> Result<Self> {
        if !(min_weight > 0.0 && min_weight <= max_weight && max_weight <= 1.0) {
            return Err(RebalError::invalid_parameter(format!(
                "weight bounds must satisfy 0 < min <= max <= 1, got [{}, {}]",
                min_weight, max_weight
            )));
        }
        Ok(Self {
            min_weight,
            max_weight,
            ..Self::default()
        })
    }

    /// Set base weighting.
    pub fn with_base(mut self, base: BaseWeighting) -> Self {
        self.base = base;
        self
    }

    /// Multiplier applied to a base weight for `signal` under `risk_multiplier`.
    ///
    /// Returns NaN when either input is not finite.
    pub fn signal_factor(signal: f64, risk_multiplier: f64) -> f64 {
        if !signal.is_finite() || !risk_multiplier.is_finite() {
            return f64::NAN;
        }
        (1.0 + MAX_SIGNAL_TILT * signal * risk_multiplier)
            .clamp(1.0 - MAX_SIGNAL_TILT, 1.0 + MAX_SIGNAL_TILT)
    }

    /// Base weights summing to one.
    ///
    /// Under inverse-volatility weighting a symbol without a usable
    /// volatility gets the mean of the usable inverse volatilities.
    pub fn base_weights(
        &self,
        symbols: &[Symbol],
        volatilities: &BTreeMap<Symbol, f64>,
    ) -> BTreeMap<Symbol, f64> {
        let n = symbols.len();
        if n == 0 {
            return BTreeMap::new();
        }
        let equal = || -> BTreeMap<Symbol, f64> {
            symbols.iter().map(|s| (s.clone(), 1.0 / n as f64)).collect()
        };

        match self.base {
            BaseWeighting::EqualWeight => equal(),
            BaseWeighting::InverseVolatility => {
                let inverse: Vec<Option<f64>> = symbols
                    .iter()
                    .map(|s| volatilities.get(s).copied().and_then(inverse_volatility))
                    .collect();
                let usable: Vec<f64> = inverse.iter().flatten().copied().collect();
                if usable.is_empty() {
                    return equal();
                }
                let fallback = usable.iter().sum::<f64>() / usable.len() as f64;
                let raw: Vec<f64> = inverse.iter().map(|v| v.unwrap_or(fallback)).collect();
                let total: f64 = raw.iter().sum();

                symbols
                    .iter()
                    .zip(raw)
                    .map(|(s, r)| (s.clone(), r / total))
                    .collect()
            }
        }
    }

    /// Size `symbols` into an allocation plan.
    ///
    /// `symbols` must already exclude anything without a price this cycle.
    /// Missing signals count as neutral.
    pub fn size(
        &self,
        symbols: &[Symbol],
        signals: &BTreeMap<Symbol, Signal>,
        regime: &RegimeState,
        volatilities: &BTreeMap<Symbol, f64>,
    ) -> AllocationPlan {
        let base = self.base_weights(symbols, volatilities);

        let adjusted: BTreeMap<Symbol, f64> = base
            .iter()
            .map(|(symbol, &weight)| {
                let signal = signals.get(symbol).map(|s| s.value).unwrap_or(0.0);
                let tilted = weight * Self::signal_factor(signal, regime.risk_multiplier);
                let value = if tilted.is_finite() && tilted >= 0.0 {
                    tilted
                } else {
                    debug!(symbol = %symbol, signal, "non-finite sizing, using base weight");
                    weight
                };
                (symbol.clone(), value)
            })
            .collect();

        self.bound(&adjusted)
    }

    /// Size using 7-day volatilities read from `store` at `date`.
    pub fn size_from_store<S: PriceHistoryStore>(
        &self,
        store: &S,
        symbols: &[Symbol],
        signals: &BTreeMap<Symbol, Signal>,
        regime: &RegimeState,
        date: NaiveDate,
    ) -> AllocationPlan {
        let volatilities: BTreeMap<Symbol, f64> = match self.base {
            BaseWeighting::EqualWeight => BTreeMap::new(),
            BaseWeighting::InverseVolatility => symbols
                .iter()
                .filter_map(|s| {
                    let closes = store.series(s)?.closes_until(date, VOLATILITY_WINDOW + 1);
                    Some((s.clone(), volatility(&closes, VOLATILITY_WINDOW)))
                })
                .collect(),
        };
        self.size(symbols, signals, regime, &volatilities)
    }

    /// Clip raw weights into `[min_weight, max_weight]` and normalise to one.
    ///
    /// When the bounds cannot absorb all capital (`n * max_weight < 1`) every
    /// symbol is capped and the shortfall goes to the reserve slot.
    pub fn bound(&self, raw: &BTreeMap<Symbol, f64>) -> AllocationPlan {
        let n = raw.len();
        if n == 0 {
            return AllocationPlan::all_reserve();
        }
        let (lo, hi) = (self.min_weight, self.max_weight);

        if n as f64 * hi <= 1.0 + WEIGHT_EPSILON {
            let reserve = (1.0 - n as f64 * hi).max(0.0);
            return AllocationPlan {
                weights: raw.keys().map(|s| (s.clone(), hi)).collect(),
                reserve,
            };
        }
        if n as f64 * lo >= 1.0 - WEIGHT_EPSILON {
            return AllocationPlan {
                weights: raw.keys().map(|s| (s.clone(), 1.0 / n as f64)).collect(),
                reserve: 0.0,
            };
        }

        let mut fixed: BTreeMap<&str, f64> = BTreeMap::new();
        let mut weights: BTreeMap<Symbol, f64> = BTreeMap::new();

        for _ in 0..=n {
            let free: Vec<(&Symbol, f64)> = raw
                .iter()
                .filter(|(s, _)| !fixed.contains_key(s.as_str()))
                .map(|(s, w)| (s, w.max(0.0)))
                .collect();
            let free_mass = 1.0 - fixed.values().sum::<f64>();
            let free_raw: f64 = free.iter().map(|(_, w)| w).sum();

            weights.clear();
            for (symbol, value) in &fixed {
                weights.insert(symbol.to_string(), *value);
            }
            for (symbol, w) in &free {
                let share = if free_raw > 0.0 {
                    w / free_raw
                } else {
                    1.0 / free.len() as f64
                };
                weights.insert((*symbol).clone(), share * free_mass);
            }

            let over: Vec<&Symbol> = free
                .iter()
                .filter(|(s, _)| weights[*s] > hi + WEIGHT_EPSILON)
                .map(|(s, _)| *s)
                .collect();
            if !over.is_empty() {
                for s in over {
                    fixed.insert(s.as_str(), hi);
                }
                continue;
            }

            let under: Vec<&Symbol> = free
                .iter()
                .filter(|(s, _)| weights[*s] < lo - WEIGHT_EPSILON)
                .map(|(s, _)| *s)
                .collect();
            if !under.is_empty() {
                for s in under {
                    fixed.insert(s.as_str(), lo);
                }
                continue;
            }
            break;
        }

        settle_residual(&mut weights, lo, hi);
        AllocationPlan {
            weights,
            reserve: 0.0,
        }
    }
}

/// Spread any leftover mass over symbols with room inside the bounds.
fn settle_residual(weights: &mut BTreeMap<Symbol, f64>, lo: f64, hi: f64) {
    for w in weights.values_mut() {
        *w = w.clamp(lo, hi);
    }
    let residual = 1.0 - weights.values().sum::<f64>();
    if residual.abs() <= WEIGHT_EPSILON {
        return;
    }

    let room = |w: f64| if residual > 0.0 { hi - w } else { w - lo };
    let total_room: f64 = weights.values().map(|w| room(*w)).sum();
    if total_room <= 0.0 {
        return;
    }
    for w in weights.values_mut() {
        *w += residual * room(*w) / total_room;
    }
}
