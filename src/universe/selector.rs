//! Momentum-ranked selection of the active trading universe.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::series::{PriceHistoryStore, PriceSeries};
use crate::core::types::Symbol;
use crate::indicators::{pct_change, trend_consistency, volatility};

/// Closes needed to score a candidate (7 daily returns).
pub const MIN_SCORING_HISTORY: usize = 8;

/// Short momentum window in days.
const RECENT_WINDOW: usize = 3;
/// Medium momentum / consistency / volatility window in days.
const MEDIUM_WINDOW: usize = 7;

/// How strongly candidate volatility is penalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilitySelectionMode {
    /// Tolerate volatile coins.
    HighVolatility,
    /// Standard penalty.
    AverageVolatility,
    /// Strongly prefer calm coins.
    LowVolatility,
}

impl Default for VolatilitySelectionMode {
    fn default() -> Self {
        VolatilitySelectionMode::AverageVolatility
    }
}

impl VolatilitySelectionMode {
    /// Multiplier applied to 7-day volatility in the momentum score.
    pub fn penalty_factor(self) -> f64 {
        match self {
            VolatilitySelectionMode::HighVolatility => 0.25,
            VolatilitySelectionMode::AverageVolatility => 1.0,
            VolatilitySelectionMode::LowVolatility => 2.0,
        }
    }
}

/// Scored universe member for one selection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinCandidate {
    pub symbol: Symbol,
    /// Composite ranking score.
    pub momentum_score: f64,
    /// 7-day realised volatility.
    pub volatility: f64,
    /// Fraction of 7-day returns in the dominant direction.
    pub trend_consistency: f64,
}

/// Symbols currently eligible for allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveUniverse {
    /// Symbols in ranked order.
    symbols: Vec<Symbol>,
    /// Anchor subset.
    anchors: Vec<Symbol>,
}

impl ActiveUniverse {
    /// Universe of the anchors alone.
    pub fn anchors_only(anchors: &[Symbol]) -> Self {
        Self {
            symbols: anchors.to_vec(),
            anchors: anchors.to_vec(),
        }
    }

    #[inline]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[inline]
    pub fn anchors(&self) -> &[Symbol] {
        &self.anchors
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn is_anchor(&self, symbol: &str) -> bool {
        self.anchors.iter().any(|s| s == symbol)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Ranks the candidate universe and picks the active set.
#[derive(Debug, Clone)]
pub struct UniverseSelector {
    /// Always-included symbols.
    anchors: Vec<Symbol>,
    /// Target number of selected symbols.
    universe_size: usize,
    /// Volatility handling.
    mode: VolatilitySelectionMode,
    /// Cycles between refreshes.
    refresh_cadence: usize,
}

impl UniverseSelector {
    /// Create a selector.
    pub fn new(anchors: Vec<Symbol>, universe_size: usize) -> Self {
        Self {
            anchors,
            universe_size,
            mode: VolatilitySelectionMode::default(),
            refresh_cadence: 7,
        }
    }

    /// Set volatility selection mode.
    pub fn with_mode(mut self, mode: VolatilitySelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set refresh cadence in cycles (minimum 1).
    pub fn with_refresh_cadence(mut self, cadence: usize) -> Self {
        self.refresh_cadence = cadence.max(1);
        self
    }

    #[inline]
    pub fn anchors(&self) -> &[Symbol] {
        &self.anchors
    }

    /// Whether a refresh is scheduled at `cycle_index`.
    #[inline]
    pub fn is_refresh_due(&self, cycle_index: usize) -> bool {
        cycle_index % self.refresh_cadence == 0
    }

    /// Score one symbol using closes up to and including `date`.
    ///
    /// Returns `None` when fewer than [`MIN_SCORING_HISTORY`] closes exist.
    pub fn score(&self, series: &PriceSeries, date: NaiveDate) -> Option<CoinCandidate> {
        let closes = series.closes_until(date, MEDIUM_WINDOW + 1);
        if closes.len() < MIN_SCORING_HISTORY {
            return None;
        }

        let recent = pct_change(&closes, RECENT_WINDOW);
        let medium = pct_change(&closes, MEDIUM_WINDOW);
        let consistency = trend_consistency(&closes, MEDIUM_WINDOW);
        let vol = volatility(&closes, MEDIUM_WINDOW);

        let score = recent + medium + consistency - self.mode.penalty_factor() * vol;
        if !score.is_finite() {
            return None;
        }

        Some(CoinCandidate {
            symbol: series.symbol().to_string(),
            momentum_score: score,
            volatility: vol,
            trend_consistency: consistency,
        })
    }

    /// Score every symbol in `universe` that has enough history.
    pub fn candidates<S: PriceHistoryStore>(
        &self,
        store: &S,
        universe: &[Symbol],
        date: NaiveDate,
    ) -> Vec<CoinCandidate> {
        universe
            .iter()
            .filter_map(|symbol| {
                let candidate = store.series(symbol).and_then(|s| self.score(s, date));
                if candidate.is_none() {
                    debug!(symbol = %symbol, %date, "insufficient history for scoring");
                }
                candidate
            })
            .collect()
    }

    /// Pick the top `k` candidates and force-include the anchors.
    ///
    /// Ties are broken by symbol order. A missing anchor replaces the
    /// lowest-ranked non-anchor when the top `k` is full, and is appended
    /// otherwise.
    pub fn select(&self, candidates: &[CoinCandidate], k: usize) -> ActiveUniverse {
        let mut ranked: Vec<&CoinCandidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked.dedup_by(|a, b| a.symbol == b.symbol);

        let mut selected: Vec<Symbol> = ranked.iter().take(k).map(|c| c.symbol.clone()).collect();

        for anchor in &self.anchors {
            if selected.contains(anchor) {
                continue;
            }
            if selected.len() >= k {
                let victim = selected
                    .iter()
                    .rposition(|s| !self.anchors.contains(s));
                if let Some(idx) = victim {
                    selected.remove(idx);
                }
            }
            selected.push(anchor.clone());
        }

        // Ranked order first, unscored anchors last
        let position = |symbol: &Symbol| {
            ranked
                .iter()
                .position(|c| &c.symbol == symbol)
                .unwrap_or(usize::MAX)
        };
        selected.sort_by(|a, b| position(a).cmp(&position(b)).then_with(|| a.cmp(b)));

        ActiveUniverse {
            symbols: selected,
            anchors: self.anchors.clone(),
        }
    }

    /// Universe for `cycle_index`: reselected when due, otherwise `current`.
    pub fn refresh<S: PriceHistoryStore>(
        &self,
        current: Option<&ActiveUniverse>,
        cycle_index: usize,
        store: &S,
        universe: &[Symbol],
        date: NaiveDate,
    ) -> ActiveUniverse {
        match current {
            Some(active) if !self.is_refresh_due(cycle_index) => active.clone(),
            _ => {
                let candidates = self.candidates(store, universe, date);
                let active = self.select(&candidates, self.universe_size);
                info!(
                    cycle = cycle_index,
                    %date,
                    scored = candidates.len(),
                    selected = ?active.symbols(),
                    "universe refreshed"
                );
                active
            }
        }
    }
}

/// Higher score first, then symbol ascending.
fn rank_order(a: &CoinCandidate, b: &CoinCandidate) -> Ordering {
    b.momentum_score
        .partial_cmp(&a.momentum_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::InMemoryPriceStore;

    fn candidate(symbol: &str, score: f64) -> CoinCandidate {
        CoinCandidate {
            symbol: symbol.to_string(),
            momentum_score: score,
            volatility: 0.02,
            trend_consistency: 0.5,
        }
    }

    fn anchors() -> Vec<Symbol> {
        vec!["BTC".to_string(), "ETH".to_string()]
    }

    #[test]
    fn test_select_top_k_keeps_anchors() {
        let selector = UniverseSelector::new(anchors(), 3);
        let candidates = vec![
            candidate("SOL", 0.9),
            candidate("AVAX", 0.8),
            candidate("LINK", 0.7),
            candidate("BTC", 0.1),
            candidate("ETH", 0.2),
        ];

        let universe = selector.select(&candidates, 3);

        assert_eq!(universe.len(), 3);
        assert!(universe.contains("BTC"));
        assert!(universe.contains("ETH"));
        // Best non-anchor survives, the weaker ones are replaced
        assert!(universe.contains("SOL"));
        assert!(!universe.contains("LINK"));
    }

    #[test]
    fn test_select_ties_broken_by_symbol() {
        let selector = UniverseSelector::new(anchors(), 4);
        let candidates = vec![
            candidate("DOT", 0.5),
            candidate("ADA", 0.5),
            candidate("BTC", 0.9),
            candidate("ETH", 0.8),
            candidate("XRP", 0.5),
        ];

        let universe = selector.select(&candidates, 4);
        assert_eq!(universe.symbols(), &["BTC", "ETH", "ADA", "DOT"]);
    }

    #[test]
    fn test_select_with_few_candidates() {
        let selector = UniverseSelector::new(anchors(), 8);
        let universe = selector.select(&[candidate("SOL", 0.3)], 8);

        // SOL plus both anchors even though the anchors were never scored
        assert_eq!(universe.symbols(), &["SOL", "BTC", "ETH"]);
    }

    #[test]
    fn test_select_empty_candidates_is_anchor_only() {
        let selector = UniverseSelector::new(anchors(), 5);
        let universe = selector.select(&[], 5);
        assert_eq!(universe, ActiveUniverse::anchors_only(&anchors()));
    }

    #[test]
    fn test_score_requires_history() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = PriceSeries::from_closes("SOL", start, &[1.0, 1.1, 1.2]).unwrap();
        let selector = UniverseSelector::new(anchors(), 3);

        assert!(selector.score(&series, start + chrono::Duration::days(2)).is_none());
    }

    #[test]
    fn test_steady_uptrend_outscores_choppy() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let steady: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let choppy: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 100.0 } else { 104.0 })
            .collect();

        let store: InMemoryPriceStore = vec![
            PriceSeries::from_closes("STEADY", start, &steady).unwrap(),
            PriceSeries::from_closes("CHOPPY", start, &choppy).unwrap(),
        ]
        .into_iter()
        .collect();

        let selector = UniverseSelector::new(anchors(), 3);
        let date = start + chrono::Duration::days(9);
        let universe = vec!["STEADY".to_string(), "CHOPPY".to_string()];
        let scored = selector.candidates(&store, &universe, date);

        let steady_score = scored.iter().find(|c| c.symbol == "STEADY").unwrap();
        let choppy_score = scored.iter().find(|c| c.symbol == "CHOPPY").unwrap();
        assert!(steady_score.momentum_score > choppy_score.momentum_score);
        assert!((steady_score.trend_consistency - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_cadence() {
        let selector = UniverseSelector::new(anchors(), 3).with_refresh_cadence(7);
        assert!(selector.is_refresh_due(0));
        assert!(!selector.is_refresh_due(3));
        assert!(selector.is_refresh_due(14));
    }
}
