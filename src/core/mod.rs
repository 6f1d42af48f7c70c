//! Core types and utilities for RebalBT.

pub mod config;
pub mod error;
pub mod series;
pub mod types;

pub use config::SimulationConfig;
pub use error::{RebalError, Result};
pub use series::{InMemoryPriceStore, PriceHistoryStore, PricePoint, PriceSeries, PriceSource};
pub use types::*;
