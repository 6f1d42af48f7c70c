//! Numeric primitives shared by the decision components.
//!
//! Helpers never return NaN: degenerate inputs (short history, zero
//! dispersion) yield a defined default instead.

pub mod statistics;
pub mod trend;
pub mod volatility;

pub use statistics::{compound, correlation, mean, std_dev, zscore};
pub use trend::{pct_change, trend_consistency, trend_strength};
pub use volatility::{daily_returns, inverse_volatility, volatility};
