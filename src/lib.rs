//! RebalBT - Regime-aware crypto portfolio rebalancing simulator.
//!
//! This crate simulates a portfolio that rebalances every cycle across a
//! dynamically selected set of coins:
//! - Momentum-ranked universe selection with forced anchor assets
//! - Market regime detection from two anchors
//! - Hybrid momentum + mean-reversion signals weighted by regime
//! - Bounded, signal-tilted position sizing
//! - A capital-protection state machine with cooldown
//! - Calibration of raw returns onto realistic bands
//!
//! Price history must be resident before a run starts; see
//! [`core::series::InMemoryPriceStore`].

pub mod calibration;
pub mod core;
pub mod execution;
pub mod indicators;
pub mod metrics;
pub mod portfolio;
pub mod regime;
pub mod signals;
pub mod simulation;
pub mod universe;

pub use crate::calibration::CalibrationProfile;
pub use crate::core::{
    AllocationPlan, CycleResult, InMemoryPriceStore, PriceHistoryStore, PriceSeries, RebalError,
    Regime, Result, SimulationConfig,
};
pub use crate::metrics::SimulationSummary;
pub use crate::simulation::{SimulationOutcome, SimulationRunner, StopFlag, StopReason};
