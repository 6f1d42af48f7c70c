//! Incremental drawdown tracking.

/// Drawdown tracker for incremental portfolio value updates.
#[derive(Debug, Clone, Default)]
pub struct DrawdownTracker {
    /// Highest value seen.
    peak: f64,
    /// Deepest drawdown seen, as a fraction of peak.
    max_drawdown: f64,
    /// Updates since the last peak.
    current_duration: usize,
    /// Longest stretch below a peak.
    max_duration: usize,
}

impl DrawdownTracker {
    /// Create a tracker starting at `initial_value`.
    pub fn with_initial(initial_value: f64) -> Self {
        Self {
            peak: initial_value,
            ..Self::default()
        }
    }

    /// Update with new portfolio value.
    pub fn update(&mut self, value: f64) {
        if value >= self.peak {
            self.peak = value;
            self.current_duration = 0;
            return;
        }

        self.current_duration += 1;
        self.max_duration = self.max_duration.max(self.current_duration);
        if self.peak > 0.0 {
            let drawdown = (self.peak - value) / self.peak;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }
    }

    /// Get maximum drawdown as percentage.
    #[inline]
    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown * 100.0
    }

    /// Longest run of updates spent below a peak.
    #[inline]
    pub fn max_duration(&self) -> usize {
        self.max_duration
    }
}
