//! Market regime classification from two anchor assets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::series::PriceSeries;
use crate::core::types::Regime;
use crate::indicators::{correlation, daily_returns, pct_change, volatility};

/// Closes needed for the 14-day window (14 daily returns).
pub const MIN_REGIME_HISTORY: usize = 15;

const SHORT_WINDOW: usize = 3;
const MEDIUM_WINDOW: usize = 7;
const LONG_WINDOW: usize = 14;

/// Default rebalance threshold (one-way turnover).
const BASE_REBALANCE_THRESHOLD: f64 = 0.05;
/// Rebalance threshold while volatile.
const VOLATILE_REBALANCE_THRESHOLD: f64 = 0.10;

/// Trend and volatility of one anchor over the 3/7/14-day windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub trend_3d: f64,
    pub trend_7d: f64,
    pub trend_14d: f64,
    pub volatility_3d: f64,
    pub volatility_7d: f64,
    pub volatility_14d: f64,
}

impl WindowMetrics {
    /// Compute from closes ending at the evaluation date.
    pub fn from_closes(closes: &[f64]) -> Self {
        Self {
            trend_3d: pct_change(closes, SHORT_WINDOW),
            trend_7d: pct_change(closes, MEDIUM_WINDOW),
            trend_14d: pct_change(closes, LONG_WINDOW),
            volatility_3d: volatility(closes, SHORT_WINDOW),
            volatility_7d: volatility(closes, MEDIUM_WINDOW),
            volatility_14d: volatility(closes, LONG_WINDOW),
        }
    }
}

/// Inputs to the classification rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeMetrics {
    pub anchor_a: WindowMetrics,
    pub anchor_b: WindowMetrics,
    /// Correlation of daily returns over 14 days.
    pub correlation_14d: f64,
}

impl RegimeMetrics {
    /// Mean 7-day volatility of the two anchors.
    pub fn mean_volatility_7d(&self) -> f64 {
        (self.anchor_a.volatility_7d + self.anchor_b.volatility_7d) / 2.0
    }
}

/// Current regime with the strategy parameters it implies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub label: Regime,
    /// Scales how far signals move weights.
    pub risk_multiplier: f64,
    /// Share of the hybrid signal taken from momentum.
    pub momentum_weight: f64,
    /// Minimum one-way turnover before a rebalance is executed.
    pub rebalance_threshold: f64,
    /// Metrics behind the classification (absent when history was short).
    pub metrics: Option<RegimeMetrics>,
}

impl RegimeState {
    /// Fixed parameters for `label`.
    pub fn for_label(label: Regime) -> Self {
        let (risk_multiplier, momentum_weight, rebalance_threshold) = match label {
            Regime::Bull => (1.3, 0.7, BASE_REBALANCE_THRESHOLD),
            Regime::Bear => (0.7, 0.3, BASE_REBALANCE_THRESHOLD),
            Regime::Volatile => (1.0, 0.5, VOLATILE_REBALANCE_THRESHOLD),
            Regime::Sideways => (1.0, 0.5, BASE_REBALANCE_THRESHOLD),
        };
        Self {
            label,
            risk_multiplier,
            momentum_weight,
            rebalance_threshold,
            metrics: None,
        }
    }

    /// Sideways state used when history is insufficient.
    pub fn neutral() -> Self {
        Self::for_label(Regime::Sideways)
    }

    fn with_metrics(mut self, metrics: RegimeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl Default for RegimeState {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// 7-day volatility above which the market is Volatile.
    pub high_volatility: f64,
    /// Minimum |trend| for a 7/14-day move to count as directional.
    pub trend: f64,
    /// Correlation required for Bull.
    pub correlation: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            high_volatility: 0.05,
            trend: 0.01,
            correlation: 0.5,
        }
    }
}

/// Stateless regime detector.
#[derive(Debug, Clone, Default)]
pub struct RegimeDetector {
    thresholds: RegimeThresholds,
}

impl RegimeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set thresholds.
    pub fn with_thresholds(mut self, thresholds: RegimeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[inline]
    pub fn thresholds(&self) -> &RegimeThresholds {
        &self.thresholds
    }

    /// Classify using anchor histories up to and including `date`.
    pub fn detect(&self, anchor_a: &PriceSeries, anchor_b: &PriceSeries, date: NaiveDate) -> RegimeState {
        let a = anchor_a.closes_until(date, MIN_REGIME_HISTORY);
        let b = anchor_b.closes_until(date, MIN_REGIME_HISTORY);
        self.detect_closes(&a, &b)
    }

    /// Classify from two close sequences ending at the evaluation date.
    ///
    /// Fewer than [`MIN_REGIME_HISTORY`] closes on either side gives Sideways.
    pub fn detect_closes(&self, anchor_a: &[f64], anchor_b: &[f64]) -> RegimeState {
        if anchor_a.len() < MIN_REGIME_HISTORY || anchor_b.len() < MIN_REGIME_HISTORY {
            return RegimeState::neutral();
        }

        let metrics = self.measure(anchor_a, anchor_b);
        RegimeState::for_label(self.classify(&metrics)).with_metrics(metrics)
    }

    /// Compute window metrics and 14-day return correlation.
    pub fn measure(&self, anchor_a: &[f64], anchor_b: &[f64]) -> RegimeMetrics {
        let tail = |closes: &[f64]| {
            let start = closes.len().saturating_sub(LONG_WINDOW + 1);
            daily_returns(&closes[start..])
        };

        RegimeMetrics {
            anchor_a: WindowMetrics::from_closes(anchor_a),
            anchor_b: WindowMetrics::from_closes(anchor_b),
            correlation_14d: correlation(&tail(anchor_a), &tail(anchor_b)),
        }
    }

    /// Ordered rule cascade; the first matching rule wins.
    pub fn classify(&self, metrics: &RegimeMetrics) -> Regime {
        let t = &self.thresholds;
        let (a, b) = (&metrics.anchor_a, &metrics.anchor_b);

        if a.volatility_7d > t.high_volatility || b.volatility_7d > t.high_volatility {
            return Regime::Volatile;
        }

        let rising = |m: &WindowMetrics| m.trend_7d > t.trend && m.trend_14d > t.trend;
        if rising(a) && rising(b) && metrics.correlation_14d > t.correlation {
            return Regime::Bull;
        }

        let falling = |m: &WindowMetrics| m.trend_7d < -t.trend && m.trend_14d < -t.trend;
        if falling(a) && falling(b) {
            return Regime::Bear;
        }

        Regime::Sideways
    }
}
