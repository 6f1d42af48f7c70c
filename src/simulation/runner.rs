//! Sequential simulation cycle loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calibration::{calibrate, CalibrationContext, CalibrationProfile};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::series::{PriceHistoryStore, PriceSeries};
use crate::core::types::{AllocationPlan, CycleResult, Price, Symbol};
use crate::execution::{CostModel, ExecutionCost};
use crate::indicators::{mean, volatility};
use crate::metrics::SimulationSummary;
use crate::portfolio::{
    PortfolioState, PositionSizer, ProtectionConfig, ProtectionController, ProtectionInputs,
    ProtectionState, Transition,
};
use crate::regime::RegimeDetector;
use crate::signals::HybridSignalEngine;
use crate::universe::{ActiveUniverse, UniverseSelector};

/// Lookback for the market volatility fed to protection and slippage.
const MARKET_VOLATILITY_WINDOW: usize = 7;

/// Cooperative cancellation flag checked between cycles.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next cycle.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every configured cycle ran.
    Completed,
    /// Anchor price data ran out.
    DataExhausted,
    /// The stop flag was raised.
    Cancelled,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Name of the calibration profile used.
    pub profile: String,
    /// Cycle results ordered by cycle index.
    pub cycles: Vec<CycleResult>,
    pub summary: SimulationSummary,
    /// Frozen portfolio state after the last cycle.
    pub final_state: PortfolioState,
    /// Protection state after the last cycle.
    pub protection: ProtectionState,
    /// Protection mode changes in order.
    pub transitions: Vec<Transition>,
    pub stop_reason: StopReason,
}

impl SimulationOutcome {
    /// Cycle results as pretty-printed JSON.
    pub fn cycles_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.cycles)?)
    }
}

/// One simulation instance over resident price history.
pub struct SimulationRunner<'a, S: PriceHistoryStore> {
    config: SimulationConfig,
    profile: CalibrationProfile,
    store: &'a S,
    selector: UniverseSelector,
    detector: RegimeDetector,
    signals: HybridSignalEngine,
    sizer: PositionSizer,
    protection: ProtectionController,
    costs: CostModel,
    stop: StopFlag,
}

impl<'a, S: PriceHistoryStore> SimulationRunner<'a, S> {
    /// Build a runner; every configuration error surfaces here.
    pub fn new(config: SimulationConfig, store: &'a S) -> Result<Self> {
        config.validate()?;
        let profile = CalibrationProfile::by_name(&config.calibration_profile)?;

        let selector = UniverseSelector::new(config.anchors.clone(), config.universe_size)
            .with_mode(config.volatility_selection_mode)
            .with_refresh_cadence(config.refresh_cadence_cycles);
        let sizer =
            PositionSizer::new(config.min_weight, config.max_weight)?.with_base(config.base_weighting);
        let protection = ProtectionController::new(ProtectionConfig {
            cooldown_cycles: config.cooldown_cycles,
            max_protection_fraction: config.max_protection_fraction,
            ..ProtectionConfig::default()
        });
        let costs = CostModel::from_config(&config);

        Ok(Self {
            config,
            profile,
            store,
            selector,
            detector: RegimeDetector::new(),
            signals: HybridSignalEngine::default(),
            sizer,
            protection,
            costs,
            stop: StopFlag::new(),
        })
    }

    /// Use an external stop flag.
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Replace the cost model built from the config rates.
    pub fn with_cost_model(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    /// Replace the regime detector.
    pub fn with_detector(mut self, detector: RegimeDetector) -> Self {
        self.detector = detector;
        self
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Handle for stopping this run from another thread.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Run every cycle.
    ///
    /// Missing data is recovered per cycle; running out of anchor data ends
    /// the run early with the cycles completed so far.
    pub fn run(&self) -> Result<SimulationOutcome> {
        let config = &self.config;
        let num_cycles = config.num_cycles();
        info!(
            profile = %self.profile.name,
            cycles = num_cycles,
            start = %config.start_date,
            capital = config.starting_capital,
            reserve = %config.reserve_symbol,
            "simulation started"
        );

        let mut state = PortfolioState::new(config.starting_capital);
        let mut protection = ProtectionState::default();
        let mut universe: Option<ActiveUniverse> = None;
        let mut held = AllocationPlan::all_reserve();
        let mut context = CalibrationContext {
            cycle_index: 0,
            accumulated: 0.0,
            cycle_length_minutes: config.cycle_length_minutes,
        };
        let mut value = config.starting_capital;
        let mut cycles = Vec::with_capacity(num_cycles);
        let mut transitions = Vec::new();
        let mut stop_reason = StopReason::Completed;

        for i in 0..num_cycles {
            if self.stop.is_stopped() {
                info!(cycle = i, "simulation cancelled");
                stop_reason = StopReason::Cancelled;
                break;
            }

            let date = config.cycle_date(i);
            let mark = config.mark_date(i);
            let Some((anchor_a, anchor_b)) = self.anchor_series(date, mark) else {
                warn!(cycle = i, %date, %mark, "anchor price data exhausted");
                stop_reason = StopReason::DataExhausted;
                break;
            };

            let regime = self.detector.detect(anchor_a, anchor_b, date);

            let active = self
                .selector
                .refresh(universe.as_ref(), i, self.store, &config.universe, date);

            let (mut eligible, excluded): (Vec<Symbol>, Vec<Symbol>) = active
                .symbols()
                .iter()
                .cloned()
                .partition(|s| self.priced(s, date) && self.priced(s, mark));
            for symbol in &excluded {
                warn!(cycle = i, symbol = %symbol, %date, "missing price, excluded for this cycle");
            }
            if eligible.len() < config.min_symbols {
                debug!(cycle = i, eligible = eligible.len(), "too few symbols, anchors only");
                eligible = config.anchors.clone();
            }
            universe = Some(active);

            let signals = self.signals.signals_for(self.store, &eligible, date, &regime);
            let mut plan = self
                .sizer
                .size_from_store(self.store, &eligible, &signals, &regime, date);

            let market_volatility = self.market_volatility(date);
            let mut transition = None;
            if config.enable_usdc_protection {
                if let Some(market_return) = self.market_return(i, date) {
                    let inputs = ProtectionInputs {
                        cycle_index: i,
                        market_return,
                        volatility: market_volatility,
                    };
                    let (next, changed) = self.protection.update(protection, inputs);
                    protection = next;
                    transition = changed;
                }
                if protection.is_protected() {
                    plan = self.protection.apply(&plan);
                }
            }

            // Weights actually held after last cycle's drift
            let held_prices = self.last_prices(state.holdings.keys(), date);
            let current = state.allocation(&held_prices).unwrap_or_else(|| held.clone());

            let forced = i == 0
                || transition.is_some()
                || !current.held_symbols().eq(plan.held_symbols());
            let turnover = plan.turnover(&current);
            let rebalanced = forced || turnover >= regime.rebalance_threshold;
            let position = if rebalanced { plan } else { current.clone() };

            let mark_prices = self.prices_on(position.weights.keys(), mark);
            let asset_returns = self.asset_returns(&position, date, &mark_prices);
            let cost = if rebalanced {
                self.costs
                    .rebalance_cost(&current, &position, &asset_returns, market_volatility)
            } else {
                ExecutionCost::default()
            };

            let gross_return: f64 = position
                .weights
                .iter()
                .map(|(s, w)| w * asset_returns.get(s).copied().unwrap_or(0.0))
                .sum();
            let raw_return = gross_return - cost.total();
            let calibrated_return = calibrate(raw_return, &self.profile, &context);
            context = context.advance(calibrated_return);
            value *= 1.0 + calibrated_return;

            let drifted = drift(&position, &asset_returns, gross_return);
            state = state.advance(&drifted, value, &mark_prices)?;

            debug!(
                cycle = i,
                %date,
                regime = %regime.label,
                rebalanced,
                gross_return,
                cost = cost.total(),
                calibrated_return,
                value,
                "cycle complete"
            );

            cycles.push(CycleResult {
                cycle_index: i,
                date,
                regime: regime.label,
                selected_coins: eligible,
                excluded_coins: excluded,
                allocation: position.clone(),
                reserve_symbol: config.reserve_symbol.clone(),
                rebalanced,
                gross_return,
                cost: cost.total(),
                raw_return,
                calibrated_return,
                portfolio_value: value,
                protection_active: protection.is_protected(),
            });
            transitions.extend(transition);
            held = position;
        }

        let summary = SimulationSummary::from_cycles(
            config.starting_capital,
            &cycles,
            transitions.len(),
            config.cycle_length_minutes,
        );
        info!(
            profile = %self.profile.name,
            cycles = summary.cycles,
            total_return_pct = summary.total_return_pct,
            max_drawdown_pct = summary.max_drawdown_pct,
            protection_active_cycles = summary.protection_active_cycles,
            "simulation finished"
        );

        Ok(SimulationOutcome {
            profile: self.profile.name.clone(),
            cycles,
            summary,
            final_state: state.freeze(),
            protection,
            transitions,
            stop_reason,
        })
    }

    /// First two anchors, if both are priced at `date` and `mark`.
    fn anchor_series(&self, date: NaiveDate, mark: NaiveDate) -> Option<(&'a PriceSeries, &'a PriceSeries)> {
        let store: &'a S = self.store;
        let a = store.series(&self.config.anchors[0])?;
        let b = store.series(&self.config.anchors[1])?;
        let priced = |s: &PriceSeries| s.close_on(date).is_some() && s.close_on(mark).is_some();
        let rest_priced = self.config.anchors[2..]
            .iter()
            .all(|s| self.priced(s, date) && self.priced(s, mark));
        (priced(a) && priced(b) && rest_priced).then_some((a, b))
    }

    fn priced(&self, symbol: &str, date: NaiveDate) -> bool {
        self.store
            .close_on(symbol, date)
            .map_or(false, |p| p > 0.0)
    }

    /// Closes on exactly `date`; unpriced symbols are left out.
    fn prices_on<'s>(
        &self,
        symbols: impl Iterator<Item = &'s Symbol>,
        date: NaiveDate,
    ) -> BTreeMap<Symbol, Price> {
        symbols
            .filter_map(|s| Some((s.clone(), self.store.close_on(s, date)?)))
            .collect()
    }

    /// Last close on or before `date` for each symbol.
    fn last_prices<'s>(
        &self,
        symbols: impl Iterator<Item = &'s Symbol>,
        date: NaiveDate,
    ) -> BTreeMap<Symbol, Price> {
        symbols
            .filter_map(|s| {
                let close = self.store.series(s)?.history_until(date).last()?.close;
                Some((s.clone(), close))
            })
            .collect()
    }

    /// Return of each held symbol from `date` to the mark prices.
    fn asset_returns(
        &self,
        position: &AllocationPlan,
        date: NaiveDate,
        mark_prices: &BTreeMap<Symbol, Price>,
    ) -> BTreeMap<Symbol, f64> {
        position
            .weights
            .keys()
            .filter_map(|s| {
                let open = self.store.close_on(s, date)?;
                let close = mark_prices.get(s)?;
                (open > 0.0).then(|| (s.clone(), close / open - 1.0))
            })
            .collect()
    }

    /// Mean anchor return over the cycle that just closed.
    fn market_return(&self, cycle_index: usize, date: NaiveDate) -> Option<f64> {
        let from = (cycle_index > 0).then(|| self.config.cycle_date(cycle_index - 1));
        let returns: Vec<f64> = self
            .config
            .anchors
            .iter()
            .filter_map(|symbol| {
                let series = self.store.series(symbol)?;
                let end = series.close_on(date)?;
                let start = match from {
                    Some(d) => series.close_on(d)?,
                    None => {
                        let closes = series.closes_until(date, 2);
                        (closes.len() == 2).then(|| closes[0])?
                    }
                };
                (start > 0.0).then(|| end / start - 1.0)
            })
            .collect();

        if returns.is_empty() {
            return None;
        }
        Some(mean(&returns))
    }

    /// Mean 7-day volatility of the anchors.
    fn market_volatility(&self, date: NaiveDate) -> f64 {
        let values: Vec<f64> = self
            .config
            .anchors
            .iter()
            .filter_map(|symbol| {
                let closes = self
                    .store
                    .series(symbol)?
                    .closes_until(date, MARKET_VOLATILITY_WINDOW + 1);
                Some(volatility(&closes, MARKET_VOLATILITY_WINDOW))
            })
            .collect();
        mean(&values)
    }
}

/// Weights at the end of a cycle after each asset moved by its return.
fn drift(position: &AllocationPlan, asset_returns: &BTreeMap<Symbol, f64>, gross_return: f64) -> AllocationPlan {
    let growth = 1.0 + gross_return;
    if growth <= 0.0 || !growth.is_finite() {
        return position.clone();
    }
    AllocationPlan {
        weights: position
            .weights
            .iter()
            .map(|(s, w)| {
                let r = asset_returns.get(s).copied().unwrap_or(0.0);
                (s.clone(), w * (1.0 + r) / growth)
            })
            .collect(),
        reserve: position.reserve / growth,
    }
}
