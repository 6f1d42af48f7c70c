//! Simulation configuration.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::{RebalError, Result};
use super::types::Symbol;
use crate::calibration::CalibrationProfile;
use crate::portfolio::allocation::BaseWeighting;
use crate::universe::VolatilitySelectionMode;

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Simulation configuration.
///
/// Every option except `start_date` has a default, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// First decision date.
    pub start_date: NaiveDate,
    /// Simulated horizon in days.
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    /// Cycle length in minutes (1440 = daily).
    #[serde(default = "default_cycle_length")]
    pub cycle_length_minutes: u32,
    /// Initial portfolio value.
    #[serde(default = "default_starting_capital")]
    pub starting_capital: f64,
    /// Calibration profile name.
    #[serde(default = "default_profile")]
    pub calibration_profile: String,
    /// How the universe selector treats volatility.
    #[serde(default)]
    pub volatility_selection_mode: VolatilitySelectionMode,
    /// Enable the capital-protection controller.
    #[serde(default = "default_true")]
    pub enable_usdc_protection: bool,
    /// Cycles between universe refreshes.
    #[serde(default = "default_refresh_cadence")]
    pub refresh_cadence_cycles: usize,
    /// Candidate universe.
    #[serde(default = "default_universe")]
    pub universe: Vec<Symbol>,
    /// Anchor assets; the first two drive regime detection.
    #[serde(default = "default_anchors")]
    pub anchors: Vec<Symbol>,
    /// Stable asset used as the reserve slot.
    #[serde(default = "default_reserve_symbol")]
    pub reserve_symbol: Symbol,
    /// Number of coins selected per refresh.
    #[serde(default = "default_universe_size")]
    pub universe_size: usize,
    /// Fewer eligible symbols than this falls back to anchors only.
    #[serde(default = "default_min_symbols")]
    pub min_symbols: usize,
    /// Lower bound for a risk-asset weight.
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    /// Upper bound for a risk-asset weight.
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    /// Base weighting before signal adjustment.
    #[serde(default)]
    pub base_weighting: BaseWeighting,
    /// Trading cost per unit of one-way turnover (0.0008 = 0.08%).
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Turnover-sized fee schedule as `(threshold, rate)` pairs; replaces
    /// `fee_rate` when non-empty.
    #[serde(default)]
    pub fee_tiers: Vec<(f64, f64)>,
    /// Slippage per unit of one-way turnover.
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: f64,
    /// Extra slippage per unit of market volatility; zero keeps slippage flat.
    #[serde(default)]
    pub slippage_volatility_factor: f64,
    /// Fraction of a cycle's move missed on newly bought weight.
    #[serde(default = "default_execution_delay")]
    pub execution_delay: f64,
    /// Cycles after a protection transition during which no transition is evaluated.
    #[serde(default = "default_cooldown_cycles")]
    pub cooldown_cycles: usize,
    /// Reserve weight enforced while protected.
    #[serde(default = "default_max_protection_fraction")]
    pub max_protection_fraction: f64,
}

fn default_duration_days() -> u32 { 30 }
fn default_cycle_length() -> u32 { MINUTES_PER_DAY }
fn default_starting_capital() -> f64 { 10_000.0 }
fn default_profile() -> String { "moderate_realistic".to_string() }
fn default_true() -> bool { true }
fn default_refresh_cadence() -> usize { 7 }
fn default_reserve_symbol() -> Symbol { "USDC".to_string() }
fn default_universe_size() -> usize { 8 }
fn default_min_symbols() -> usize { 3 }
fn default_min_weight() -> f64 { 0.02 }
fn default_max_weight() -> f64 { 0.25 }
fn default_fee_rate() -> f64 { 0.0008 }
fn default_slippage_rate() -> f64 { 0.0005 }
fn default_execution_delay() -> f64 { 0.1 }
fn default_cooldown_cycles() -> usize { 3 }
fn default_max_protection_fraction() -> f64 { 0.6 }

fn default_anchors() -> Vec<Symbol> {
    vec!["BTC".to_string(), "ETH".to_string()]
}

fn default_universe() -> Vec<Symbol> {
    [
        "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "AVAX", "DOT", "LINK", "MATIC", "LTC", "ATOM",
        "UNI", "DOGE", "NEAR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl SimulationConfig {
    /// Config with every default and the given start date.
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            duration_days: default_duration_days(),
            cycle_length_minutes: default_cycle_length(),
            starting_capital: default_starting_capital(),
            calibration_profile: default_profile(),
            volatility_selection_mode: VolatilitySelectionMode::default(),
            enable_usdc_protection: true,
            refresh_cadence_cycles: default_refresh_cadence(),
            universe: default_universe(),
            anchors: default_anchors(),
            reserve_symbol: default_reserve_symbol(),
            universe_size: default_universe_size(),
            min_symbols: default_min_symbols(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
            base_weighting: BaseWeighting::default(),
            fee_rate: default_fee_rate(),
            fee_tiers: Vec::new(),
            slippage_rate: default_slippage_rate(),
            slippage_volatility_factor: 0.0,
            execution_delay: default_execution_delay(),
            cooldown_cycles: default_cooldown_cycles(),
            max_protection_fraction: default_max_protection_fraction(),
        }
    }

    /// Load from a config file (TOML/JSON/YAML by extension) with
    /// `REBALBT_*` environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("REBALBT"))
            .build()?;
        let conf: SimulationConfig = settings.try_deserialize()?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check every option; returns the first fatal problem.
    pub fn validate(&self) -> Result<()> {
        CalibrationProfile::by_name(&self.calibration_profile)?;

        if !self.starting_capital.is_finite() || self.starting_capital <= 0.0 {
            return Err(RebalError::invalid_config(format!(
                "starting_capital must be positive, got {}",
                self.starting_capital
            )));
        }
        if self.duration_days == 0 {
            return Err(RebalError::invalid_config("duration_days must be > 0"));
        }
        if self.cycle_length_minutes == 0 || self.cycle_length_minutes % MINUTES_PER_DAY != 0 {
            return Err(RebalError::invalid_config(format!(
                "cycle_length_minutes must be a positive multiple of {}, got {}",
                MINUTES_PER_DAY, self.cycle_length_minutes
            )));
        }
        if self.refresh_cadence_cycles == 0 {
            return Err(RebalError::invalid_config("refresh_cadence_cycles must be > 0"));
        }
        if self.universe.is_empty() {
            return Err(RebalError::invalid_config("universe is empty"));
        }
        if self.anchors.len() < 2 {
            return Err(RebalError::invalid_config("at least two anchor assets are required"));
        }
        if let Some(missing) = self.anchors.iter().find(|a| !self.universe.contains(a)) {
            return Err(RebalError::invalid_config(format!(
                "anchor {} is not in the universe",
                missing
            )));
        }
        if self.universe.contains(&self.reserve_symbol) {
            return Err(RebalError::invalid_config(format!(
                "reserve asset {} must not be a universe member",
                self.reserve_symbol
            )));
        }
        if self.universe_size < self.anchors.len() {
            return Err(RebalError::invalid_config(
                "universe_size must be at least the number of anchors",
            ));
        }
        if !(self.min_weight > 0.0 && self.min_weight <= self.max_weight && self.max_weight <= 1.0) {
            return Err(RebalError::invalid_config(format!(
                "weight bounds must satisfy 0 < min <= max <= 1, got [{}, {}]",
                self.min_weight, self.max_weight
            )));
        }
        if self.fee_rate < 0.0 || self.slippage_rate < 0.0 || self.slippage_volatility_factor < 0.0 {
            return Err(RebalError::invalid_config("cost rates must be non-negative"));
        }
        if self.fee_tiers.iter().any(|(threshold, rate)| *threshold < 0.0 || *rate < 0.0)
            || self.fee_tiers.windows(2).any(|w| w[1].0 <= w[0].0)
        {
            return Err(RebalError::invalid_config(
                "fee_tiers must be non-negative with strictly increasing thresholds",
            ));
        }
        if !(0.0..=1.0).contains(&self.execution_delay) {
            return Err(RebalError::invalid_config("execution_delay must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.max_protection_fraction) {
            return Err(RebalError::invalid_config("max_protection_fraction must be in [0, 1]"));
        }
        Ok(())
    }

    /// Number of cycles in the configured horizon.
    pub fn num_cycles(&self) -> usize {
        let minutes = self.duration_days as u64 * MINUTES_PER_DAY as u64;
        (minutes / self.cycle_length_minutes.max(1) as u64).max(1) as usize
    }

    /// Price date used for decisions at `cycle_index`.
    ///
    /// Cycle lengths are whole days, so consecutive cycles never share a date.
    pub fn cycle_date(&self, cycle_index: usize) -> NaiveDate {
        let elapsed = cycle_index as i64 * self.cycle_length_minutes as i64;
        self.start_date + Duration::days(elapsed / MINUTES_PER_DAY as i64)
    }

    /// Price date at which a position opened at `cycle_index` is marked.
    pub fn mark_date(&self, cycle_index: usize) -> NaiveDate {
        self.cycle_date(cycle_index + 1)
    }
}
