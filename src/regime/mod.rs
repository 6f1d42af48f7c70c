//! Market regime detection.

pub mod detector;

pub use detector::{
    RegimeDetector, RegimeMetrics, RegimeState, RegimeThresholds, WindowMetrics,
    MIN_REGIME_HISTORY,
};
