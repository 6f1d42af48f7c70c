//! Trend primitives: percentage change, trend strength and consistency.

use super::volatility::daily_returns;

/// Fractional change of the last close over `window` days.
///
/// Returns 0.0 when fewer than `window + 1` closes are available or the base
/// price is not positive.
pub fn pct_change(closes: &[f64], window: usize) -> f64 {
    let n = closes.len();
    if window == 0 || n < window + 1 {
        return 0.0;
    }
    let base = closes[n - 1 - window];
    let last = closes[n - 1];
    if base <= 0.0 || !base.is_finite() || !last.is_finite() {
        return 0.0;
    }
    last / base - 1.0
}

/// Trend strength over `window` days normalised to [-1, 1].
///
/// `scale` is the fractional move that maps to ~0.76 (tanh(1)); larger
/// moves saturate towards ±1.
pub fn trend_strength(closes: &[f64], window: usize, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.0;
    }
    let change = pct_change(closes, window);
    let strength = (change / scale).tanh();
    if strength.is_finite() {
        strength
    } else {
        0.0
    }
}

/// Fraction of day-over-day returns in the last `window` days that share the
/// dominant direction.
///
/// Flat days count toward neither side. Returns 0.0 with no usable returns.
pub fn trend_consistency(closes: &[f64], window: usize) -> f64 {
    let start = closes.len().saturating_sub(window + 1);
    let returns = daily_returns(&closes[start..]);
    if returns.is_empty() {
        return 0.0;
    }

    let ups = returns.iter().filter(|r| **r > 0.0).count();
    let downs = returns.iter().filter(|r| **r < 0.0).count();
    ups.max(downs) as f64 / returns.len() as f64
}
