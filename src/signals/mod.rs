//! Trading signals.
//!
//! Blends a trend-following component with a mean-reversion component,
//! weighted by the current market regime.

pub mod hybrid;

pub use hybrid::{HybridSignalConfig, HybridSignalEngine, Signal};
