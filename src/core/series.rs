//! Daily price series and the price-history collaborator interfaces.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{RebalError, Result};
use super::types::{Price, Symbol};

/// A single dated close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Price,
}

/// Ordered, immutable sequence of daily closes for one symbol.
///
/// Dates are strictly increasing. A date that is absent from the series is
/// treated as missing data for that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: Symbol,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Create a validated series.
    ///
    /// Fails if dates are not strictly increasing or a close is not a positive
    /// finite number.
    pub fn new(symbol: impl Into<Symbol>, points: Vec<PricePoint>) -> Result<Self> {
        let symbol = symbol.into();

        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(RebalError::invalid_series(
                    symbol,
                    format!("dates not strictly increasing at {}", pair[1].date),
                ));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(RebalError::invalid_series(
                symbol,
                format!("non-positive close {} on {}", bad.close, bad.date),
            ));
        }

        Ok(Self { symbol, points })
    }

    /// Build a contiguous daily series starting at `start`.
    pub fn from_closes(symbol: impl Into<Symbol>, start: NaiveDate, closes: &[Price]) -> Result<Self> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + Duration::days(i as i64),
                close,
            })
            .collect();
        Self::new(symbol, points)
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Close on exactly `date`, if present.
    pub fn close_on(&self, date: NaiveDate) -> Option<Price> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].close)
    }

    /// All points dated on or before `date`.
    pub fn history_until(&self, date: NaiveDate) -> &[PricePoint] {
        let end = self.points.partition_point(|p| p.date <= date);
        &self.points[..end]
    }

    /// The last `count` closes dated on or before `date` (fewer if history is short).
    pub fn closes_until(&self, date: NaiveDate, count: usize) -> Vec<Price> {
        let history = self.history_until(date);
        let start = history.len().saturating_sub(count);
        history[start..].iter().map(|p| p.close).collect()
    }

    /// Copy of this series with every point inside `[from, to]` removed.
    pub fn without_range(&self, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .filter(|p| p.date < from || p.date > to)
                .copied()
                .collect(),
        }
    }
}

/// Read-only access to resident price history.
///
/// All data the simulation needs must be resident before the cycle loop
/// starts; implementations must not block.
pub trait PriceHistoryStore {
    /// Series for `symbol`, if any history was loaded.
    fn series(&self, symbol: &str) -> Option<&PriceSeries>;

    /// Close for `symbol` on `date`.
    fn close_on(&self, symbol: &str, date: NaiveDate) -> Option<Price> {
        self.series(symbol).and_then(|s| s.close_on(date))
    }
}

/// Market-data collaborator used to prefetch history.
pub trait PriceSource: Sync {
    /// Fetch the daily series for `symbol` covering `[start, end]`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries>;
}

/// In-memory price store keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceStore {
    series: BTreeMap<Symbol, PriceSeries>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a series.
    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().to_string(), series);
    }

    /// Remove a symbol's history entirely.
    pub fn remove(&mut self, symbol: &str) -> Option<PriceSeries> {
        self.series.remove(symbol)
    }

    /// Loaded symbols in lexical order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Fetch every symbol from `source` in parallel.
    ///
    /// A symbol whose fetch fails is logged and left out; the simulation
    /// treats it as having no data.
    pub fn prefetch<S: PriceSource>(
        source: &S,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let fetched: Vec<(Symbol, Result<PriceSeries>)> = symbols
            .par_iter()
            .map(|symbol| (symbol.clone(), source.fetch(symbol, start, end)))
            .collect();

        let mut store = Self::new();
        for (symbol, result) in fetched {
            match result {
                Ok(series) => {
                    debug!(symbol = %symbol, points = series.len(), "prefetched price history");
                    store.insert(series);
                }
                Err(err) => warn!(symbol = %symbol, error = %err, "price history unavailable"),
            }
        }
        store
    }
}

impl FromIterator<PriceSeries> for InMemoryPriceStore {
    fn from_iter<I: IntoIterator<Item = PriceSeries>>(iter: I) -> Self {
        let mut store = Self::new();
        for series in iter {
            store.insert(series);
        }
        store
    }
}

impl PriceHistoryStore for InMemoryPriceStore {
    fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }
}
