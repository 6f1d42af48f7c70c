//! Named calibration profiles.

use serde::{Deserialize, Serialize};

use crate::core::error::{RebalError, Result};

/// Bounds and damping that map idealised returns onto a realistic band.
///
/// `target_low..target_high` is the cumulative return a representative
/// bullish run over `horizon_days` is expected to land in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub name: String,
    /// Lower edge of the target band (0.35 = 35%).
    pub target_low: f64,
    /// Upper edge of the target band; cumulative return never exceeds its prorated value.
    pub target_high: f64,
    /// Horizon the band refers to.
    pub horizon_days: u32,
    /// Slope of the compression near zero.
    pub damping: f64,
    /// Largest calibrated gain per cycle.
    pub gain_cap: f64,
    /// Largest calibrated loss per cycle (positive number).
    pub loss_cap: f64,
    /// Cumulative return treated as flat.
    pub noise_band: f64,
}

impl CalibrationProfile {
    /// 15–35% over 30 days.
    pub fn conservative_realistic() -> Self {
        Self {
            name: "conservative_realistic".to_string(),
            target_low: 0.15,
            target_high: 0.35,
            horizon_days: 30,
            damping: 0.5,
            gain_cap: 0.02,
            loss_cap: 0.03,
            noise_band: 0.02,
        }
    }

    /// 35–65% over 30 days.
    pub fn moderate_realistic() -> Self {
        Self {
            name: "moderate_realistic".to_string(),
            target_low: 0.35,
            target_high: 0.65,
            horizon_days: 30,
            damping: 0.75,
            gain_cap: 0.03,
            loss_cap: 0.04,
            noise_band: 0.03,
        }
    }

    /// 65–110% over 30 days.
    pub fn aggressive_realistic() -> Self {
        Self {
            name: "aggressive_realistic".to_string(),
            target_low: 0.65,
            target_high: 1.10,
            horizon_days: 30,
            damping: 1.0,
            gain_cap: 0.05,
            loss_cap: 0.06,
            noise_band: 0.05,
        }
    }

    /// Every built-in profile.
    pub fn all() -> Vec<Self> {
        vec![
            Self::conservative_realistic(),
            Self::moderate_realistic(),
            Self::aggressive_realistic(),
        ]
    }

    /// Look up a built-in profile.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "conservative_realistic" => Ok(Self::conservative_realistic()),
            "moderate_realistic" => Ok(Self::moderate_realistic()),
            "aggressive_realistic" => Ok(Self::aggressive_realistic()),
            _ => Err(RebalError::unknown_profile(name)),
        }
    }

    /// Whether a cumulative return lies inside the target band.
    pub fn in_band(&self, total_return: f64) -> bool {
        total_return >= self.target_low && total_return <= self.target_high
    }

    /// Whether a cumulative return is indistinguishable from flat.
    pub fn is_flat(&self, total_return: f64) -> bool {
        total_return.abs() <= self.noise_band
    }

    /// Highest cumulative return allowed after `elapsed_days`.
    pub fn ceiling(&self, elapsed_days: f64) -> f64 {
        let horizon = self.horizon_days.max(1) as f64;
        (1.0 + self.target_high).powf(elapsed_days.max(0.0) / horizon) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let profile = CalibrationProfile::by_name("moderate_realistic").unwrap();
        assert!((profile.target_low - 0.35).abs() < 1e-12);
        assert!((profile.target_high - 0.65).abs() < 1e-12);
        assert_eq!(profile.horizon_days, 30);
    }

    #[test]
    fn test_unknown_profile() {
        let err = CalibrationProfile::by_name("optimistic").unwrap_err();
        assert!(matches!(err, RebalError::UnknownProfile { ref name } if name == "optimistic"));
    }

    #[test]
    fn test_bands_are_ordered() {
        let profiles = CalibrationProfile::all();
        for pair in profiles.windows(2) {
            assert!(pair[0].target_high <= pair[1].target_low);
        }
    }

    #[test]
    fn test_ceiling() {
        let profile = CalibrationProfile::moderate_realistic();
        assert!(profile.ceiling(0.0).abs() < 1e-12);
        assert!((profile.ceiling(30.0) - 0.65).abs() < 1e-12);
        assert!(profile.ceiling(15.0) < 0.65 / 2.0);
    }
}
