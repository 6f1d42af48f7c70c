//! Rebalancing cost simulation.

pub mod cost;
pub mod fees;
pub mod slippage;

pub use cost::{CostModel, ExecutionCost};
pub use fees::FeeModel;
pub use slippage::{ExecutionDelay, SlippageModel};
