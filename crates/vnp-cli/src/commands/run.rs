//! `vnp run`: every strategy in a bundle, then comparison and recommendation.
//!
//! Bundle format:
//!
//! ```json
//! {
//!   "budget": 100000000,
//!   "prices": { "FPT": 118300, "HPG": 27450 },
//!   "strategies": [
//!     { "strategy": "max_sharpe", "weights": { "FPT": 0.6, "HPG": 0.4 },
//!       "expected_return": 0.21, "volatility": 0.25, "sharpe": 0.84 }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use vnp_backtest::{backtest_weights, load_price_history_csv, PriceHistory};
use tracing::warn;
use vnp_config::{CommandScope, Settings};
use vnp_portfolio::PriceMap;
use vnp_strategy::{
    compare, recommend, ComparisonRow, DrawdownSource, OptimizationResult, OptimizerOutput, RunContext,
    ScoreCard, StrategyKind, StrategyRunner,
};

use super::{
    backtest_settings, load_settings, print_json, read_json_file, recommendation_weights, runner_settings,
    ConfigArgs,
};

pub struct RunArgs {
    pub input_path: String,
    pub budget: Option<f64>,
    pub history_path: Option<String>,
    pub config: ConfigArgs,
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct RunBundle {
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    prices: PriceMap,
    strategies: Vec<OptimizerOutput>,
}

#[derive(Serialize)]
struct FailureOutput {
    strategy: StrategyKind,
    error: String,
}

#[derive(Serialize)]
struct RunOutput {
    run_id: String,
    budget: f64,
    config_hash: String,
    results: Vec<OptimizationResult>,
    failures: Vec<FailureOutput>,
    comparison: Vec<ComparisonRow>,
    recommendation: Vec<ScoreCard>,
}

pub fn run(args: RunArgs) -> Result<()> {
    let (loaded, settings) = load_settings(&args.config, CommandScope::Run)?;
    let runner = StrategyRunner::new(runner_settings(&settings)?);

    let bundle: RunBundle = read_json_file(&args.input_path, "run bundle")?;
    let budget = match args.budget.or(bundle.budget) {
        Some(b) => b,
        None => bail!("no budget: pass --budget or set \"budget\" in the bundle"),
    };
    let ctx = RunContext::new(budget, Some(loaded.config_hash.clone()))
        .context("invalid run context")?;

    let history = match &args.history_path {
        Some(path) => Some(
            load_price_history_csv(path)
                .with_context(|| format!("load price history failed: {path}"))?,
        ),
        None => None,
    };
    let summary = match &history {
        Some(history) => runner.run_all(&ctx, &bundle.strategies, history),
        None => runner.run_all(&ctx, &bundle.strategies, &bundle.prices),
    };

    let mut comparison = compare(&summary.results);
    if let Some(history) = &history {
        realize_drawdowns(&mut comparison, &summary.results, history, &settings);
    }
    let recommendation = recommend(&comparison, &recommendation_weights(&settings));

    let out = RunOutput {
        run_id: summary.run_id.to_string(),
        budget: ctx.budget,
        config_hash: loaded.config_hash,
        failures: summary
            .failures
            .iter()
            .map(|f| FailureOutput {
                strategy: f.strategy,
                error: f.error.to_string(),
            })
            .collect(),
        results: summary.results,
        comparison,
        recommendation,
    };

    if args.json {
        print_json(&out)?;
    } else {
        print_lines(&out);
    }

    if out.results.is_empty() {
        bail!(
            "no strategy produced an allocation ({} failed)",
            out.failures.len()
        );
    }
    Ok(())
}

/// Swaps each row's drawdown estimate for the backtested one. Rows whose
/// backtest fails keep the estimate.
fn realize_drawdowns(
    rows: &mut [ComparisonRow],
    results: &[OptimizationResult],
    history: &PriceHistory,
    settings: &Settings,
) {
    let bt = backtest_settings(settings);
    for (row, result) in rows.iter_mut().zip(results) {
        match backtest_weights(history, &result.weights, &bt) {
            Ok(curve) => *row = row.clone().with_realized_drawdown(curve.metrics.max_drawdown),
            Err(e) => warn!(
                strategy = result.strategy.id(),
                error = %e,
                "drawdown backtest failed, keeping estimate"
            ),
        }
    }
}

fn print_lines(out: &RunOutput) {
    println!("run_id={}", out.run_id);
    println!("budget={}", out.budget);
    println!("config_hash={}", out.config_hash);

    for r in &out.results {
        println!(
            "result strategy={} allocator={} positions={} spent={} leftover={}",
            r.strategy.id(),
            r.allocator.as_str(),
            r.allocation.position_count(),
            r.budget_check.spent,
            r.allocation.leftover
        );
        for (ticker, n) in &r.allocation.shares {
            println!("shares.{}.{}={}", r.strategy.id(), ticker, n);
        }
    }

    for f in &out.failures {
        println!("failure strategy={} error={}", f.strategy.id(), f.error);
    }

    for row in &out.comparison {
        println!(
            "compare strategy={} return_pct={:.2} volatility_pct={:.2} sharpe={:.3} \
             return_risk={:.3} diversification={:.4} utilization_pct={:.2} stocks={} shares={} \
             max_drawdown_pct={} drawdown_source={}",
            row.strategy.id(),
            row.expected_return_pct,
            row.volatility_pct,
            row.sharpe,
            row.return_risk_ratio,
            row.diversification_index,
            row.capital_utilization_pct,
            row.stock_count,
            row.total_shares,
            row.max_drawdown_pct
                .map_or_else(|| "n/a".to_string(), |d| format!("{d:.2}")),
            row.drawdown_source.map_or("n/a", DrawdownSource::as_str)
        );
    }

    for (rank, card) in out.recommendation.iter().enumerate() {
        println!(
            "rank={} strategy={} score={:.2}",
            rank + 1,
            card.strategy.id(),
            card.total
        );
    }
    if let Some(best) = out.recommendation.first() {
        println!("recommended={}", best.strategy.id());
    }
}
