use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use vnp_portfolio::{Allocation, WeightMap};

use crate::metrics::{compute_performance, cumulative, PerformanceMetrics};
use crate::types::{BacktestError, BacktestSettings, PriceHistory};

/// Continuous-weight backtest result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeightBacktest {
    /// Return dates (the history's dates minus the first).
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
    /// Growth of 1.
    pub cumulative: Vec<f64>,
    /// Benchmark growth-of-1 curves on the same dates.
    pub benchmarks: BTreeMap<String, Vec<f64>>,
    /// Weighted tickers with no history. Their weight sits in cash at 0 %.
    pub skipped: Vec<String>,
    /// Configured benchmarks absent from the history.
    pub missing_benchmarks: Vec<String>,
    pub metrics: PerformanceMetrics,
}

/// Discrete holdings marked to market daily.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HoldingsBacktest {
    /// Every history date, starting value included.
    pub dates: Vec<NaiveDate>,
    /// leftover + Σ shares × close
    pub values: Vec<f64>,
    pub returns: Vec<f64>,
    pub metrics: PerformanceMetrics,
}

/// First configured benchmark present in the history.
fn primary_benchmark(history: &PriceHistory, settings: &BacktestSettings) -> Option<Vec<f64>> {
    settings
        .benchmarks
        .iter()
        .find_map(|b| history.returns(b))
}

/// Daily portfolio return = Σ w · r over tickers with history, then growth of 1.
///
/// Weights are used as given. Tickers missing from the history are skipped
/// and reported, not renormalized away.
pub fn backtest_weights(
    history: &PriceHistory,
    weights: &WeightMap,
    settings: &BacktestSettings,
) -> Result<WeightBacktest, BacktestError> {
    if history.len() < 2 {
        return Err(BacktestError::TooShort {
            observations: history.len(),
        });
    }

    let days = history.len() - 1;
    let mut returns = vec![0.0; days];
    let mut skipped = Vec::new();
    let mut used = 0usize;

    for (ticker, w) in weights.iter().filter(|(_, w)| **w != 0.0) {
        match history.returns(ticker) {
            Some(r) => {
                for (acc, ri) in returns.iter_mut().zip(&r) {
                    *acc += w * ri;
                }
                used += 1;
            }
            None => skipped.push(ticker.clone()),
        }
    }
    if used == 0 {
        return Err(BacktestError::NoUsableTickers);
    }
    if !skipped.is_empty() {
        warn!(skipped = ?skipped, "tickers without history skipped");
    }

    let mut benchmarks = BTreeMap::new();
    let mut missing_benchmarks = Vec::new();
    for b in &settings.benchmarks {
        match history.returns(b) {
            Some(r) => {
                benchmarks.insert(b.clone(), cumulative(&r));
            }
            None => missing_benchmarks.push(b.clone()),
        }
    }

    let bench = primary_benchmark(history, settings);
    let metrics = compute_performance(&returns, bench.as_deref(), settings.trading_days_per_year);
    info!(
        days,
        tickers = used,
        total_return_pct = metrics.total_return_pct,
        sharpe = metrics.sharpe,
        "weight backtest complete"
    );

    Ok(WeightBacktest {
        dates: history.dates()[1..].to_vec(),
        cumulative: cumulative(&returns),
        returns,
        benchmarks,
        skipped,
        missing_benchmarks,
        metrics,
    })
}

/// Value the allocation's whole shares plus its leftover cash on every date.
pub fn backtest_holdings(
    history: &PriceHistory,
    allocation: &Allocation,
    settings: &BacktestSettings,
) -> Result<HoldingsBacktest, BacktestError> {
    if history.len() < 2 {
        return Err(BacktestError::TooShort {
            observations: history.len(),
        });
    }

    let mut values = vec![allocation.leftover; history.len()];
    for (ticker, n) in &allocation.shares {
        let closes = history
            .closes(ticker)
            .ok_or_else(|| BacktestError::MissingTicker {
                ticker: ticker.clone(),
            })?;
        for (v, c) in values.iter_mut().zip(closes) {
            *v += *n as f64 * c;
        }
    }

    let returns: Vec<f64> = values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();

    let bench = primary_benchmark(history, settings);
    let metrics = compute_performance(&returns, bench.as_deref(), settings.trading_days_per_year);

    Ok(HoldingsBacktest {
        dates: history.dates().to_vec(),
        values,
        returns,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnp_portfolio::{asset_map, PriceMap};

    fn history() -> PriceHistory {
        let dates = (1..=4)
            .map(|d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
            .collect();
        let series = [
            ("FPT", vec![100.0, 110.0, 121.0, 121.0]),
            ("VNM", vec![50.0, 50.0, 45.0, 54.0]),
            ("VNINDEX", vec![1_000.0, 1_010.0, 1_000.0, 1_020.0]),
        ]
        .into_iter()
        .map(|(t, v)| (t.to_string(), v))
        .collect();
        PriceHistory::new(dates, series).unwrap()
    }

    #[test]
    fn weights_combine_daily_returns() {
        let w = asset_map([("FPT", 0.5), ("VNM", 0.5)]);
        let bt = backtest_weights(&history(), &w, &BacktestSettings::default()).unwrap();
        assert_eq!(bt.returns.len(), 3);
        // day 1: 0.5·0.1 + 0.5·0 ; day 2: 0.5·0.1 + 0.5·(-0.1) ; day 3: 0 + 0.5·0.2
        assert!((bt.returns[0] - 0.05).abs() < 1e-12);
        assert!(bt.returns[1].abs() < 1e-12);
        assert!((bt.returns[2] - 0.1).abs() < 1e-12);
        assert!((bt.cumulative[2] - 1.05 * 1.1).abs() < 1e-12);
        assert!(bt.benchmarks.contains_key("VNINDEX"));
        assert_eq!(bt.missing_benchmarks.len(), 3);
        assert!(bt.metrics.beta.is_some());
    }

    #[test]
    fn unknown_tickers_are_skipped() {
        let w = asset_map([("FPT", 0.5), ("SSI", 0.5)]);
        let bt = backtest_weights(&history(), &w, &BacktestSettings::default()).unwrap();
        assert_eq!(bt.skipped, vec!["SSI".to_string()]);
        assert!((bt.returns[0] - 0.05).abs() < 1e-12);

        let none = asset_map([("SSI", 1.0)]);
        assert_eq!(
            backtest_weights(&history(), &none, &BacktestSettings::default()).unwrap_err(),
            BacktestError::NoUsableTickers
        );
    }

    #[test]
    fn holdings_include_leftover_cash() {
        let prices: PriceMap = asset_map([("FPT", 100.0), ("VNM", 50.0)]);
        let alloc = Allocation::from_counts([("FPT", 2), ("VNM", 3)], &prices, 400.0);
        assert_eq!(alloc.leftover, 50.0);

        let bt = backtest_holdings(&history(), &alloc, &BacktestSettings::default()).unwrap();
        assert_eq!(bt.values[0], 400.0);
        assert_eq!(bt.values[1], 50.0 + 220.0 + 150.0);
        assert_eq!(bt.values.len(), 4);
        assert_eq!(bt.returns.len(), 3);
    }

    #[test]
    fn holdings_require_history_for_every_position() {
        let prices = asset_map([("SSI", 10.0)]);
        let alloc = Allocation::from_counts([("SSI", 1)], &prices, 100.0);
        assert!(matches!(
            backtest_holdings(&history(), &alloc, &BacktestSettings::default()).unwrap_err(),
            BacktestError::MissingTicker { .. }
        ));
    }
}
