//! Hybrid momentum + mean-reversion signal.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::series::PriceHistoryStore;
use crate::core::types::Symbol;
use crate::indicators::{trend_strength, zscore};
use crate::regime::RegimeState;

/// Per-symbol composite signal in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    /// Blended value.
    pub value: f64,
    /// Trend-following component.
    pub momentum: f64,
    /// Contrarian component.
    pub mean_reversion: f64,
}

impl Signal {
    /// Zero signal.
    pub fn neutral(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            value: 0.0,
            momentum: 0.0,
            mean_reversion: 0.0,
        }
    }

    #[inline]
    pub fn is_neutral(&self) -> bool {
        self.value == 0.0
    }
}

/// Signal engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridSignalConfig {
    /// Momentum lookback in days.
    pub momentum_window: usize,
    /// Moving-average lookback in days.
    pub reversion_window: usize,
    /// 7-day move that maps to tanh(1) momentum.
    pub momentum_scale: f64,
    /// Z-score magnitude that maps to a full reversion signal.
    pub zscore_scale: f64,
}

impl Default for HybridSignalConfig {
    fn default() -> Self {
        Self {
            momentum_window: 7,
            reversion_window: 14,
            momentum_scale: 0.10,
            zscore_scale: 2.0,
        }
    }
}

/// Stateless hybrid signal engine.
#[derive(Debug, Clone, Default)]
pub struct HybridSignalEngine {
    config: HybridSignalConfig,
}

impl HybridSignalEngine {
    pub fn new(config: HybridSignalConfig) -> Self {
        Self { config }
    }

    /// Closes required for a non-neutral signal.
    pub fn min_history(&self) -> usize {
        self.config
            .reversion_window
            .max(self.config.momentum_window + 1)
    }

    /// Signal for `symbol` from closes ending at the evaluation date.
    ///
    /// Short history gives a neutral signal.
    pub fn signal(&self, symbol: &str, closes: &[f64], regime: &RegimeState) -> Signal {
        if closes.len() < self.min_history() {
            return Signal::neutral(symbol);
        }

        let momentum = trend_strength(closes, self.config.momentum_window, self.config.momentum_scale);
        let mean_reversion = self.mean_reversion(closes);

        let w = regime.momentum_weight.clamp(0.0, 1.0);
        let blended = w * momentum + (1.0 - w) * mean_reversion;
        let value = if blended.is_finite() {
            blended.clamp(-1.0, 1.0)
        } else {
            0.0
        };

        Signal {
            symbol: symbol.to_string(),
            value,
            momentum,
            mean_reversion,
        }
    }

    /// Sign-inverted z-score of the last close against its moving average.
    fn mean_reversion(&self, closes: &[f64]) -> f64 {
        let window = self.config.reversion_window;
        if window == 0 || closes.len() < window || self.config.zscore_scale <= 0.0 {
            return 0.0;
        }
        let tail = &closes[closes.len() - window..];
        let Some(price) = tail.last().copied() else {
            return 0.0;
        };

        let z = zscore(price, tail);
        let reversion = (-z / self.config.zscore_scale).clamp(-1.0, 1.0);
        if reversion.is_finite() {
            reversion
        } else {
            0.0
        }
    }

    /// Signals for every symbol, using history up to and including `date`.
    pub fn signals_for<S: PriceHistoryStore>(
        &self,
        store: &S,
        symbols: &[Symbol],
        date: NaiveDate,
        regime: &RegimeState,
    ) -> BTreeMap<Symbol, Signal> {
        symbols
            .iter()
            .map(|symbol| {
                let signal = match store.series(symbol) {
                    Some(series) => {
                        let closes = series.closes_until(date, self.min_history());
                        self.signal(symbol, &closes, regime)
                    }
                    None => Signal::neutral(symbol.as_str()),
                };
                (symbol.clone(), signal)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Regime;

    fn engine() -> HybridSignalEngine {
        HybridSignalEngine::default()
    }

    #[test]
    fn test_short_history_is_neutral() {
        let regime = RegimeState::neutral();
        let signal = engine().signal("SOL", &[1.0, 2.0, 3.0], &regime);
        assert!(signal.is_neutral());
    }

    #[test]
    fn test_flat_prices_are_neutral() {
        let regime = RegimeState::neutral();
        let signal = engine().signal("SOL", &[50.0; 20], &regime);
        assert_eq!(signal.value, 0.0);
    }

    #[test]
    fn test_dip_below_average_is_bullish_reversion() {
        // Flat at 100 with a sharp last-day drop, no 7-day trend before it
        let mut closes = vec![100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 100.0, 101.0];
        closes.extend_from_slice(&[100.0, 101.0, 100.0, 101.0, 100.0, 90.0]);
        let signal = engine().signal("SOL", &closes, &RegimeState::for_label(Regime::Bear));

        assert!(signal.mean_reversion > 0.0);
        assert!(signal.momentum < 0.0);
        // Bear weights reversion at 70%
        assert!(signal.value > 0.0);
    }

    #[test]
    fn test_regime_weighting() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * 1.02f64.powi(i)).collect();

        let bull = engine().signal("SOL", &closes, &RegimeState::for_label(Regime::Bull));
        let bear = engine().signal("SOL", &closes, &RegimeState::for_label(Regime::Bear));

        // Same components, different blend
        assert_eq!(bull.momentum, bear.momentum);
        assert!(bull.value > bear.value);
        assert!(bull.value <= 1.0 && bear.value >= -1.0);
    }

    #[test]
    fn test_signal_is_bounded() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * 1.5f64.powi(i)).collect();
        let signal = engine().signal("PUMP", &closes, &RegimeState::for_label(Regime::Bull));
        assert!(signal.value >= -1.0 && signal.value <= 1.0);
    }
}
