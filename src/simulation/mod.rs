//! Simulation orchestration.

pub mod batch;
pub mod runner;

pub use batch::{run_batch, run_profiles};
pub use runner::{SimulationOutcome, SimulationRunner, StopFlag, StopReason};
