//! Capital-protection state machine.
//!
//! The controller is stateless: [`ProtectionController::update`] takes the
//! previous [`ProtectionState`] and this cycle's market inputs and returns the
//! next state plus the transition, if one happened. While protected, the
//! allocation is shifted toward the reserve asset by
//! [`ProtectionController::apply`].

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::types::AllocationPlan;
use crate::indicators::{compound, mean};

/// Sentiment smoothing factor.
const SENTIMENT_ALPHA: f64 = 0.2;

/// Protection posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectionMode {
    Normal,
    Protected,
}

impl Default for ProtectionMode {
    fn default() -> Self {
        ProtectionMode::Normal
    }
}

impl fmt::Display for ProtectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionMode::Normal => f.write_str("normal"),
            ProtectionMode::Protected => f.write_str("protected"),
        }
    }
}

/// Market observations for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionInputs {
    /// Cycle being decided.
    pub cycle_index: usize,
    /// Anchor-basket return over the cycle just closed.
    pub market_return: f64,
    /// Anchor 7-day volatility.
    pub volatility: f64,
}

/// A change of protection mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub cycle_index: usize,
    pub from: ProtectionMode,
    pub to: ProtectionMode,
    /// Conditions that held when the transition fired.
    pub triggers: Vec<String>,
}

/// Controller state carried between cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionState {
    pub mode: ProtectionMode,
    /// Updates left before transitions are evaluated again.
    pub cooldown_remaining: usize,
    /// Smoothed share of positive cycles in [0, 1].
    pub sentiment_score: f64,
    /// Most recent market returns, oldest first.
    pub recent_returns: VecDeque<f64>,
    /// Most recent volatility readings, oldest first.
    pub recent_volatility: VecDeque<f64>,
    /// Transitions so far.
    pub transitions: usize,
}

impl Default for ProtectionState {
    fn default() -> Self {
        Self {
            mode: ProtectionMode::Normal,
            cooldown_remaining: 0,
            sentiment_score: 0.5,
            recent_returns: VecDeque::new(),
            recent_volatility: VecDeque::new(),
            transitions: 0,
        }
    }
}

impl ProtectionState {
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.mode == ProtectionMode::Protected
    }

    /// Compounded return of the last `n` observations (fewer if short).
    fn compounded(&self, n: usize) -> f64 {
        let start = self.recent_returns.len().saturating_sub(n);
        let tail: Vec<f64> = self.recent_returns.range(start..).copied().collect();
        compound(&tail)
    }

    /// Whether the last `n` returns all satisfy `pred` (false if short).
    fn last_all(&self, n: usize, pred: impl Fn(f64) -> bool) -> bool {
        let len = self.recent_returns.len();
        len >= n && self.recent_returns.range(len - n..).all(|r| pred(*r))
    }

    fn trailing_volatility(&self) -> f64 {
        let values: Vec<f64> = self.recent_volatility.iter().copied().collect();
        mean(&values)
    }

    /// Sum of the two returns before the last two, minus the sum of the last two.
    fn decline_acceleration(&self) -> Option<f64> {
        let len = self.recent_returns.len();
        if len < 4 {
            return None;
        }
        let r = &self.recent_returns;
        Some((r[len - 4] + r[len - 3]) - (r[len - 2] + r[len - 1]))
    }
}

/// Controller parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Ring buffer length.
    pub window: usize,
    /// Updates after a transition during which no transition is evaluated.
    pub cooldown_cycles: usize,
    /// Reserve weight enforced while protected.
    pub max_protection_fraction: f64,
    /// Returns no larger than this in magnitude count as flat for sentiment
    /// and the consecutive-cycle checks.
    pub noise_band: f64,
    pub entry_decline_3: f64,
    pub entry_decline_5: f64,
    pub entry_volatility: f64,
    pub entry_sentiment: f64,
    pub entry_acceleration: f64,
    pub exit_recovery_5: f64,
    pub exit_momentum_3: f64,
    pub exit_strong_recovery_3: f64,
    pub exit_volatility: f64,
    pub exit_sentiment: f64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            window: 5,
            cooldown_cycles: 3,
            max_protection_fraction: 0.6,
            noise_band: 0.005,
            entry_decline_3: -0.08,
            entry_decline_5: -0.12,
            entry_volatility: 0.06,
            entry_sentiment: 0.3,
            entry_acceleration: 0.05,
            exit_recovery_5: 0.03,
            exit_momentum_3: 0.02,
            exit_strong_recovery_3: 0.06,
            exit_volatility: 0.03,
            exit_sentiment: 0.6,
        }
    }
}

/// Decides when capital moves into the reserve asset.
#[derive(Debug, Clone, Default)]
pub struct ProtectionController {
    config: ProtectionConfig,
}

impl ProtectionController {
    pub fn new(config: ProtectionConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Advance one cycle.
    ///
    /// Buffers and sentiment are always updated. During cooldown the
    /// transition checks are skipped.
    pub fn update(
        &self,
        state: ProtectionState,
        inputs: ProtectionInputs,
    ) -> (ProtectionState, Option<Transition>) {
        let mut next = state;
        self.observe(&mut next, &inputs);

        if next.cooldown_remaining > 0 {
            next.cooldown_remaining -= 1;
            return (next, None);
        }

        let (to, triggers) = match next.mode {
            ProtectionMode::Normal => (ProtectionMode::Protected, self.entry_triggers(&next)),
            ProtectionMode::Protected => (ProtectionMode::Normal, self.exit_triggers(&next)),
        };
        let Some(triggers) = triggers else {
            return (next, None);
        };

        let transition = Transition {
            cycle_index: inputs.cycle_index,
            from: next.mode,
            to,
            triggers,
        };
        info!(
            cycle = inputs.cycle_index,
            from = %transition.from,
            to = %transition.to,
            triggers = ?transition.triggers,
            "protection mode changed"
        );

        next.mode = to;
        next.cooldown_remaining = self.config.cooldown_cycles;
        next.transitions += 1;
        (next, Some(transition))
    }

    fn observe(&self, state: &mut ProtectionState, inputs: &ProtectionInputs) {
        let window = self.config.window.max(1);
        let r = if inputs.market_return.is_finite() {
            inputs.market_return
        } else {
            0.0
        };
        let v = if inputs.volatility.is_finite() {
            inputs.volatility.max(0.0)
        } else {
            0.0
        };

        state.recent_returns.push_back(r);
        while state.recent_returns.len() > window {
            state.recent_returns.pop_front();
        }
        state.recent_volatility.push_back(v);
        while state.recent_volatility.len() > window {
            state.recent_volatility.pop_front();
        }

        if r.abs() > self.config.noise_band {
            let target = if r > 0.0 { 1.0 } else { 0.0 };
            let s = state.sentiment_score;
            state.sentiment_score = (s + SENTIMENT_ALPHA * (target - s)).clamp(0.0, 1.0);
        }
    }

    /// Entry triggers if the state qualifies for protection.
    fn entry_triggers(&self, state: &ProtectionState) -> Option<Vec<String>> {
        let c = &self.config;
        let decline_5 = state.compounded(5);
        let noise = c.noise_band;

        let conditions = [
            ("decline_3", state.compounded(3) <= c.entry_decline_3),
            ("consecutive_negative", state.last_all(2, |r| r < -noise)),
            ("high_volatility", state.trailing_volatility() > c.entry_volatility),
            ("decline_5", decline_5 <= c.entry_decline_5),
            ("low_sentiment", state.sentiment_score < c.entry_sentiment),
            (
                "accelerating_decline",
                state
                    .decline_acceleration()
                    .map_or(false, |a| a > c.entry_acceleration),
            ),
        ];

        qualify(&conditions, decline_5 <= c.entry_decline_5)
    }

    /// Exit triggers if the state qualifies for leaving protection.
    fn exit_triggers(&self, state: &ProtectionState) -> Option<Vec<String>> {
        let c = &self.config;
        let momentum_3 = state.compounded(3);
        let noise = c.noise_band;

        let conditions = [
            ("recovery_5", state.compounded(5) >= c.exit_recovery_5),
            ("consecutive_positive", state.last_all(2, |r| r > noise)),
            ("low_volatility", state.trailing_volatility() < c.exit_volatility),
            ("high_sentiment", state.sentiment_score > c.exit_sentiment),
            ("momentum_3", momentum_3 > c.exit_momentum_3),
        ];

        qualify(&conditions, momentum_3 >= c.exit_strong_recovery_3)
    }

    /// Shift `plan` toward the reserve so it holds at least `max_protection_fraction`.
    ///
    /// Risk weights are scaled proportionally; a plan already at or above
    /// the fraction is returned unchanged.
    pub fn apply(&self, plan: &AllocationPlan) -> AllocationPlan {
        let fraction = self.config.max_protection_fraction.clamp(0.0, 1.0);
        if plan.reserve >= fraction {
            return plan.clone();
        }

        let risk = plan.risk_weight();
        if risk <= 0.0 {
            return AllocationPlan::all_reserve();
        }
        let scale = (1.0 - fraction) / risk;
        AllocationPlan {
            weights: plan
                .weights
                .iter()
                .map(|(s, w)| (s.clone(), w * scale))
                .collect(),
            reserve: fraction,
        }
    }
}

/// At least two conditions, or the strong signal alone.
fn qualify(conditions: &[(&str, bool)], strong: bool) -> Option<Vec<String>> {
    let met: Vec<String> = conditions
        .iter()
        .filter(|(_, hit)| *hit)
        .map(|(name, _)| name.to_string())
        .collect();
    (met.len() >= 2 || strong).then_some(met)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(
        controller: &ProtectionController,
        mut state: ProtectionState,
        returns: &[f64],
        volatility: f64,
    ) -> (ProtectionState, Vec<Transition>) {
        let mut transitions = Vec::new();
        for (i, r) in returns.iter().enumerate() {
            let inputs = ProtectionInputs {
                cycle_index: i,
                market_return: *r,
                volatility,
            };
            let (next, transition) = controller.update(state, inputs);
            state = next;
            transitions.extend(transition);
        }
        (state, transitions)
    }

    #[test]
    fn test_starts_normal() {
        let state = ProtectionState::default();
        assert_eq!(state.mode, ProtectionMode::Normal);
        assert!((state.sentiment_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sentiment_update() {
        let controller = ProtectionController::default();
        let (state, _) = feed(&controller, ProtectionState::default(), &[0.01], 0.01);
        assert!((state.sentiment_score - 0.6).abs() < 1e-12);

        let (state, _) = feed(&controller, state, &[-0.01], 0.01);
        assert!((state.sentiment_score - 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_single_negative_cycle_does_not_trigger() {
        let controller = ProtectionController::default();
        let (state, transitions) = feed(&controller, ProtectionState::default(), &[-0.05], 0.01);
        assert_eq!(state.mode, ProtectionMode::Normal);
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_two_conditions_enter() {
        let controller = ProtectionController::default();
        // Consecutive negatives, then sentiment drops below 0.3 on the third
        let (state, transitions) =
            feed(&controller, ProtectionState::default(), &[-0.02, -0.02, -0.02], 0.01);

        assert_eq!(state.mode, ProtectionMode::Protected);
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].triggers.contains(&"consecutive_negative".to_string()));
        assert_eq!(state.cooldown_remaining, 3);
    }

    #[test]
    fn test_strong_decline_alone_enters() {
        let controller = ProtectionController::default();
        let state = ProtectionState {
            sentiment_score: 0.9,
            ..ProtectionState::default()
        };
        let (state, transitions) = feed(&controller, state, &[-0.13], 0.01);
        assert_eq!(state.mode, ProtectionMode::Protected);
        assert!(transitions[0].triggers.contains(&"decline_5".to_string()));
    }

    #[test]
    fn test_cooldown_blocks_exit() {
        let controller = ProtectionController::default();
        let (state, transitions) =
            feed(&controller, ProtectionState::default(), &[-0.13], 0.01);
        assert_eq!(transitions.len(), 1);

        // Strong recovery during cooldown is tracked but not acted on
        let (state, transitions) = feed(&controller, state, &[0.04, 0.04, 0.04], 0.01);
        assert!(transitions.is_empty());
        assert_eq!(state.mode, ProtectionMode::Protected);
        assert_eq!(state.cooldown_remaining, 0);

        let (state, transitions) = feed(&controller, state, &[0.01], 0.01);
        assert_eq!(transitions.len(), 1);
        assert_eq!(state.mode, ProtectionMode::Normal);
    }

    #[test]
    fn test_small_moves_are_flat() {
        let controller = ProtectionController::default();
        // Three down days of 0.1% each, then a long quiet drift
        let mut returns = vec![-0.001, -0.001, -0.001];
        returns.extend([-0.001, 0.001, -0.001, -0.001].iter().cycle().take(24));
        let (state, transitions) = feed(&controller, ProtectionState::default(), &returns, 0.001);

        assert!(transitions.is_empty());
        assert_eq!(state.mode, ProtectionMode::Normal);
        assert!((state.sentiment_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_noise_band_is_configurable() {
        let controller = ProtectionController::new(ProtectionConfig {
            noise_band: 0.0,
            ..ProtectionConfig::default()
        });
        let (state, transitions) =
            feed(&controller, ProtectionState::default(), &[-0.001, -0.001, -0.001], 0.001);

        assert_eq!(state.mode, ProtectionMode::Protected);
        assert_eq!(transitions[0].triggers, vec!["consecutive_negative", "low_sentiment"]);
    }

    #[test]
    fn test_ring_buffers_are_bounded() {
        let controller = ProtectionController::default();
        let returns = [0.001; 12];
        let (state, _) = feed(&controller, ProtectionState::default(), &returns, 0.01);
        assert_eq!(state.recent_returns.len(), 5);
        assert_eq!(state.recent_volatility.len(), 5);
    }

    #[test]
    fn test_apply_scales_risk_weights() {
        let controller = ProtectionController::default();
        let plan = AllocationPlan {
            weights: [("BTC".to_string(), 0.5), ("ETH".to_string(), 0.3)]
                .into_iter()
                .collect(),
            reserve: 0.2,
        };
        let protected = controller.apply(&plan);

        assert!((protected.reserve - 0.6).abs() < 1e-12);
        assert!((protected.weight("BTC") - 0.25).abs() < 1e-12);
        assert!((protected.weight("ETH") - 0.15).abs() < 1e-12);
        assert!(protected.is_normalized(1e-9));
    }

    #[test]
    fn test_apply_keeps_larger_reserve() {
        let controller = ProtectionController::default();
        let plan = AllocationPlan {
            weights: [("BTC".to_string(), 0.25)].into_iter().collect(),
            reserve: 0.75,
        };
        assert_eq!(controller.apply(&plan), plan);
    }
}
