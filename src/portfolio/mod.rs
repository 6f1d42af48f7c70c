//! Portfolio construction and state.

pub mod allocation;
pub mod protection;
pub mod state;

pub use allocation::{BaseWeighting, PositionSizer, MAX_SIGNAL_TILT};
pub use protection::{
    ProtectionConfig, ProtectionController, ProtectionInputs, ProtectionMode, ProtectionState,
    Transition,
};
pub use state::PortfolioState;
