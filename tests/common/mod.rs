//! Synthetic markets shared by the integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rebalbt::core::series::{InMemoryPriceStore, PriceSeries};
use rebalbt::core::SimulationConfig;

/// Days of history before the first cycle.
pub const WARMUP_DAYS: i64 = 20;

/// Test universe; the first two are the anchors.
pub const SYMBOLS: [&str; 6] = ["BTC", "ETH", "SOL", "ADA", "DOT", "LINK"];

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// Date `offset` days from the first cycle.
pub fn day(offset: i64) -> NaiveDate {
    start() + Duration::days(offset)
}

/// Store whose symbol `k` moves by `daily_return(k, d)` on day `d`.
///
/// Prices run from `-WARMUP_DAYS` to `last_day` inclusive, starting at 100.
pub fn market(last_day: i64, daily_return: impl Fn(usize, i64) -> f64) -> InMemoryPriceStore {
    SYMBOLS
        .iter()
        .enumerate()
        .map(|(k, symbol)| {
            let mut closes = vec![100.0];
            for d in (-WARMUP_DAYS + 1)..=last_day {
                let last = *closes.last().unwrap();
                closes.push(last * (1.0 + daily_return(k, d)));
            }
            PriceSeries::from_closes(*symbol, day(-WARMUP_DAYS), &closes).unwrap()
        })
        .collect()
}

/// ±0.1% on alternate days.
pub fn flat(d: i64) -> f64 {
    if d.rem_euclid(2) == 0 {
        0.001
    } else {
        -0.001
    }
}

/// ±0.1% days in runs: three down, one up.
pub fn quiet_chop(d: i64) -> f64 {
    if d.rem_euclid(4) == 3 {
        0.001
    } else {
        -0.001
    }
}

/// Steady -0.1% a day.
pub fn quiet_drift(_d: i64) -> f64 {
    -0.001
}

/// Flat, then a 10-day linear -20% decline, a 10-day linear +15% recovery, then flat.
pub fn crash_then_recovery(d: i64) -> f64 {
    match d {
        1..=10 => {
            let level = |t: i64| 1.0 - 0.02 * t as f64;
            level(d) / level(d - 1) - 1.0
        }
        11..=20 => {
            let level = |t: i64| 1.0 + 0.015 * (t - 10) as f64;
            level(d) / level(d - 1) - 1.0
        }
        _ => flat(d),
    }
}

/// Steady correlated uptrend of about 2.2% a day.
pub fn bullish(k: usize, d: i64) -> f64 {
    0.022 + 0.004 * (d as f64 + 0.3 * k as f64).sin()
}

/// Default config over the test universe.
pub fn config(profile: &str) -> SimulationConfig {
    SimulationConfig {
        calibration_profile: profile.to_string(),
        universe: SYMBOLS.iter().map(|s| s.to_string()).collect(),
        universe_size: 5,
        ..SimulationConfig::new(start())
    }
}
