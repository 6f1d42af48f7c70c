//! Streaming return statistics using Welford's algorithm.

/// Single-pass mean, variance and hit-rate of per-cycle returns.
#[derive(Debug, Clone, Default)]
pub struct ReturnStats {
    /// Number of observations.
    count: usize,
    /// Running mean.
    mean: f64,
    /// Running M2 for variance calculation.
    m2: f64,
    /// Count of positive returns.
    count_positive: usize,
    /// Count of negative returns.
    count_negative: usize,
    best: Option<f64>,
    worst: Option<f64>,
}

impl ReturnStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a new return value.
    pub fn update(&mut self, return_value: f64) {
        if !return_value.is_finite() {
            return;
        }
        self.count += 1;

        if return_value > 0.0 {
            self.count_positive += 1;
        } else if return_value < 0.0 {
            self.count_negative += 1;
        }
        self.best = Some(self.best.map_or(return_value, |b| b.max(return_value)));
        self.worst = Some(self.worst.map_or(return_value, |w| w.min(return_value)));

        // Welford's algorithm for mean and variance
        let delta = return_value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = return_value - self.mean;
        self.m2 += delta * delta2;
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Get the sample variance.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    /// Get the sample standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Annualized Sharpe ratio with a zero risk-free rate.
    ///
    /// `periods_per_year` is 365 for daily crypto cycles.
    pub fn sharpe_ratio(&self, periods_per_year: f64) -> f64 {
        let std = self.std_dev();
        if std == 0.0 || self.count < 2 {
            return 0.0;
        }
        self.mean * periods_per_year / (std * periods_per_year.sqrt())
    }

    /// Fraction of positive returns.
    pub fn win_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.count_positive as f64 / self.count as f64
    }

    #[inline]
    pub fn count_negative(&self) -> usize {
        self.count_negative
    }

    /// Best single return (0.0 when empty).
    pub fn best(&self) -> f64 {
        self.best.unwrap_or(0.0)
    }

    /// Worst single return (0.0 when empty).
    pub fn worst(&self) -> f64 {
        self.worst.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_matches_batch() {
        let data = [0.01, -0.02, 0.03, 0.005, -0.01];
        let mut stats = ReturnStats::new();
        for r in data {
            stats.update(r);
        }

        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
        assert!((stats.mean() - mean).abs() < 1e-12);
        assert!((stats.variance() - var).abs() < 1e-12);
        assert_eq!(stats.count(), 5);
    }

    #[test]
    fn test_win_rate_and_extremes() {
        let mut stats = ReturnStats::new();
        for r in [0.01, -0.02, 0.03, 0.0] {
            stats.update(r);
        }
        assert!((stats.win_rate() - 0.5).abs() < 1e-12);
        assert_eq!(stats.count_negative(), 1);
        assert!((stats.best() - 0.03).abs() < 1e-12);
        assert!((stats.worst() + 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_degenerate() {
        let mut stats = ReturnStats::new();
        stats.update(0.01);
        stats.update(0.01);
        assert_eq!(stats.sharpe_ratio(365.0), 0.0);
        assert_eq!(ReturnStats::new().win_rate(), 0.0);
    }

    #[test]
    fn test_sharpe_sign() {
        let mut stats = ReturnStats::new();
        for r in [0.02, 0.01, 0.03, -0.005] {
            stats.update(r);
        }
        assert!(stats.sharpe_ratio(365.0) > 0.0);
    }
}
