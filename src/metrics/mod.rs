//! Performance metrics.

pub mod drawdown;
pub mod streaming;
pub mod summary;

pub use drawdown::DrawdownTracker;
pub use streaming::ReturnStats;
pub use summary::SimulationSummary;
