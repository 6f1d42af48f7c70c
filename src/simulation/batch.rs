//! Independent simulations run in parallel.
//!
//! Each run owns its own state; only the read-only price store is shared.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use super::runner::{SimulationOutcome, SimulationRunner};
use crate::calibration::CalibrationProfile;
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::series::PriceHistoryStore;

/// Run one simulation per config.
///
/// Results are returned in input order, one `Result` per config.
pub fn run_batch<S>(configs: &[SimulationConfig], store: &S) -> Vec<Result<SimulationOutcome>>
where
    S: PriceHistoryStore + Sync,
{
    info!(runs = configs.len(), threads = rayon::current_num_threads(), "batch started");
    configs
        .par_iter()
        .map(|config| -> Result<SimulationOutcome> {
            SimulationRunner::new(config.clone(), store)?.run()
        })
        .collect()
}

/// Run the same window under several calibration profiles.
///
/// Every profile name is checked before any simulation starts.
pub fn run_profiles<S>(
    base: &SimulationConfig,
    store: &S,
    profiles: &[&str],
) -> Result<BTreeMap<String, SimulationOutcome>>
where
    S: PriceHistoryStore + Sync,
{
    for name in profiles {
        CalibrationProfile::by_name(name)?;
    }

    let configs: Vec<SimulationConfig> = profiles
        .iter()
        .map(|name| SimulationConfig {
            calibration_profile: name.to_string(),
            ..base.clone()
        })
        .collect();

    run_batch(&configs, store)
        .into_iter()
        .map(|outcome| outcome.map(|o| (o.profile.clone(), o)))
        .collect()
}
