//! Dynamic coin universe selection.

pub mod selector;

pub use selector::{
    ActiveUniverse, CoinCandidate, UniverseSelector, VolatilitySelectionMode, MIN_SCORING_HISTORY,
};
