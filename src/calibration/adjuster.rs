//! Raw-to-realistic return calibration.
//!
//! Each cycle's raw return is compressed with `cap * tanh(damping * raw / cap)`
//! (separate caps for gains and losses), then gains are limited so the
//! cumulative calibrated return stays under the profile's upper envelope.
//! Small raw returns pass through at roughly `damping * raw`.

use serde::{Deserialize, Serialize};

use super::profile::CalibrationProfile;
use crate::core::config::MINUTES_PER_DAY;

/// Evaluation context for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationContext {
    /// Zero-based cycle being calibrated.
    pub cycle_index: usize,
    /// Cumulative calibrated return before this cycle.
    pub accumulated: f64,
    /// Cycle length in minutes.
    pub cycle_length_minutes: u32,
}

impl CalibrationContext {
    /// Context for the first cycle of a daily run.
    pub fn daily() -> Self {
        Self {
            cycle_index: 0,
            accumulated: 0.0,
            cycle_length_minutes: MINUTES_PER_DAY,
        }
    }

    /// Days elapsed once this cycle completes.
    pub fn elapsed_days(&self) -> f64 {
        (self.cycle_index + 1) as f64 * self.cycle_length_minutes as f64 / MINUTES_PER_DAY as f64
    }

    /// Context for the following cycle after `calibrated` was applied.
    pub fn advance(&self, calibrated: f64) -> Self {
        Self {
            cycle_index: self.cycle_index + 1,
            accumulated: (1.0 + self.accumulated) * (1.0 + calibrated) - 1.0,
            cycle_length_minutes: self.cycle_length_minutes,
        }
    }
}

/// Sign-preserving compression without the envelope.
pub fn compress(raw_return: f64, profile: &CalibrationProfile) -> f64 {
    if !raw_return.is_finite() || raw_return == 0.0 {
        return 0.0;
    }
    let cap = if raw_return > 0.0 {
        profile.gain_cap
    } else {
        profile.loss_cap
    };
    if cap <= 0.0 {
        return 0.0;
    }
    cap * (profile.damping * raw_return / cap).tanh()
}

/// Calibrated return for one cycle.
///
/// Depends only on the arguments. Losses are compressed but never limited
/// by the envelope. Gains are limited to the headroom left under the
/// envelope, so once the cumulative return has reached the ceiling a
/// positive raw return calibrates to exactly 0.0. The result is never of
/// opposite sign to `raw_return`.
pub fn calibrate(raw_return: f64, profile: &CalibrationProfile, context: &CalibrationContext) -> f64 {
    let compressed = compress(raw_return, profile);
    if compressed <= 0.0 {
        return compressed;
    }

    let ceiling = profile.ceiling(context.elapsed_days());
    let headroom = ((1.0 + ceiling) / (1.0 + context.accumulated) - 1.0).max(0.0);
    compressed.min(headroom)
}

/// Calibrate a whole trajectory of raw returns.
pub fn calibrate_path(
    raw_returns: &[f64],
    profile: &CalibrationProfile,
    cycle_length_minutes: u32,
) -> Vec<f64> {
    let mut context = CalibrationContext {
        cycle_length_minutes,
        ..CalibrationContext::daily()
    };
    raw_returns
        .iter()
        .map(|raw| {
            let calibrated = calibrate(*raw, profile, &context);
            context = context.advance(calibrated);
            calibrated
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compound;

    #[test]
    fn test_sign_preserving() {
        let profile = CalibrationProfile::moderate_realistic();
        let ctx = CalibrationContext::daily();
        assert!(calibrate(0.03, &profile, &ctx) > 0.0);
        assert!(calibrate(-0.03, &profile, &ctx) < 0.0);
        assert_eq!(calibrate(0.0, &profile, &ctx), 0.0);
        assert_eq!(calibrate(f64::NAN, &profile, &ctx), 0.0);
    }

    #[test]
    fn test_monotonic() {
        let profile = CalibrationProfile::moderate_realistic();
        let ctx = CalibrationContext::daily();
        let raws = [-0.3, -0.1, -0.02, -0.001, 0.0, 0.001, 0.005, 0.02, 0.1, 0.3];
        let out: Vec<f64> = raws.iter().map(|r| calibrate(*r, &profile, &ctx)).collect();
        for pair in out.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_caps() {
        let profile = CalibrationProfile::moderate_realistic();
        let mid = CalibrationContext {
            cycle_index: 15,
            ..CalibrationContext::daily()
        };
        assert!(calibrate(0.5, &profile, &mid) <= profile.gain_cap);
        assert!(calibrate(-0.5, &profile, &mid) >= -profile.loss_cap);
    }

    #[test]
    fn test_small_returns_are_damped_linearly() {
        let profile = CalibrationProfile::moderate_realistic();
        let out = compress(0.0001, &profile);
        assert!((out - 0.000075).abs() < 1e-8);
    }

    #[test]
    fn test_envelope_limits_cumulative_return() {
        let profile = CalibrationProfile::moderate_realistic();
        let calibrated = calibrate_path(&[0.2; 30], &profile, MINUTES_PER_DAY);
        let total = compound(&calibrated);
        assert!(total <= profile.target_high + 1e-9);
        assert!(calibrated.iter().all(|r| *r >= 0.0));
    }

    #[test]
    fn test_gain_at_envelope_is_zero() {
        let profile = CalibrationProfile::moderate_realistic();
        let mut ctx = CalibrationContext {
            cycle_index: 29,
            ..CalibrationContext::daily()
        };
        ctx.accumulated = profile.ceiling(ctx.elapsed_days());
        assert_eq!(calibrate(0.02, &profile, &ctx), 0.0);
        assert!(calibrate(-0.02, &profile, &ctx) < 0.0);

        // Above the ceiling the headroom floors at zero rather than going negative
        ctx.accumulated += 0.05;
        assert_eq!(calibrate(0.02, &profile, &ctx), 0.0);
    }

    #[test]
    fn test_bullish_path_lands_in_band() {
        // Two percent a day for thirty days
        for profile in CalibrationProfile::all() {
            let calibrated = calibrate_path(&[0.02; 30], &profile, MINUTES_PER_DAY);
            let total = compound(&calibrated);
            assert!(profile.in_band(total), "{}: {}", profile.name, total);
        }
    }

    #[test]
    fn test_flat_path_stays_flat() {
        let profile = CalibrationProfile::moderate_realistic();
        let raws: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 0.001 } else { -0.001 }).collect();
        let total = compound(&calibrate_path(&raws, &profile, MINUTES_PER_DAY));
        assert!(profile.is_flat(total));
    }

    #[test]
    fn test_context_advance() {
        let ctx = CalibrationContext::daily().advance(0.1).advance(0.1);
        assert_eq!(ctx.cycle_index, 2);
        assert!((ctx.accumulated - 0.21).abs() < 1e-12);
        assert!((ctx.elapsed_days() - 3.0).abs() < 1e-12);
    }
}
