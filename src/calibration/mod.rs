//! Calibration of simulated returns onto realistic bands.

pub mod adjuster;
pub mod profile;

pub use adjuster::{calibrate, calibrate_path, compress, CalibrationContext};
pub use profile::CalibrationProfile;
