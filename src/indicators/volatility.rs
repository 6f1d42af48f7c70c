//! Volatility primitives: daily returns, realised volatility.

use super::statistics::std_dev;

/// Day-over-day simple returns.
///
/// Pairs with a non-positive or non-finite base price are skipped.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[0].is_finite() && w[1].is_finite())
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Realised volatility: sample standard deviation of the last `window` daily
/// returns.
///
/// Uses whatever history is available up to `window`; fewer than two returns
/// gives 0.0.
pub fn volatility(closes: &[f64], window: usize) -> f64 {
    let start = closes.len().saturating_sub(window + 1);
    let returns = daily_returns(&closes[start..]);
    std_dev(&returns)
}

/// Inverse-volatility weight for one asset.
///
/// Returns `None` for zero or non-finite volatility so callers can fall back
/// to an unadjusted weight.
#[inline]
pub fn inverse_volatility(vol: f64) -> Option<f64> {
    if vol > 0.0 && vol.is_finite() {
        Some(1.0 / vol)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_returns() {
        let returns = daily_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_flat_is_zero() {
        let closes = vec![100.0; 10];
        assert_eq!(volatility(&closes, 7), 0.0);
    }

    #[test]
    fn test_volatility_short_history() {
        assert_eq!(volatility(&[100.0], 7), 0.0);
        assert_eq!(volatility(&[100.0, 101.0], 7), 0.0);
    }

    #[test]
    fn test_volatility_alternating() {
        // Returns alternate +1%/-1% (approximately)
        let mut closes = vec![100.0];
        for i in 0..8 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last * 1.01 } else { last * 0.99 });
        }
        let vol = volatility(&closes, 7);
        assert!(vol > 0.009 && vol < 0.012);
    }

    #[test]
    fn test_inverse_volatility() {
        assert_eq!(inverse_volatility(0.0), None);
        assert_eq!(inverse_volatility(f64::NAN), None);
        assert!((inverse_volatility(0.02).unwrap() - 50.0).abs() < 1e-9);
    }
}
