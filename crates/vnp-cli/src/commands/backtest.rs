//! `vnp backtest`: target weights over a price-history CSV, optionally also
//! the whole-share holdings bought at the last close.

use anyhow::{Context, Result};
use serde::Serialize;
use vnp_backtest::{
    backtest_holdings, backtest_weights, load_price_history_csv, HoldingsBacktest,
    PerformanceMetrics, WeightBacktest,
};
use vnp_config::CommandScope;
use vnp_portfolio::{Allocation, WeightMap};

use super::{
    allocator_settings, backtest_settings, load_settings, parse_allocator, print_json,
    read_json_file, ConfigArgs,
};

pub struct BacktestArgs {
    pub history_path: String,
    pub weights_path: String,
    pub budget: Option<f64>,
    pub allocator: String,
    pub config: ConfigArgs,
    pub json: bool,
}

#[derive(Serialize)]
struct HoldingsOutput {
    allocation: Allocation,
    backtest: HoldingsBacktest,
}

#[derive(Serialize)]
struct BacktestOutput {
    config_hash: String,
    weights: WeightBacktest,
    #[serde(skip_serializing_if = "Option::is_none")]
    holdings: Option<HoldingsOutput>,
}

pub fn backtest(args: BacktestArgs) -> Result<()> {
    let (loaded, settings) = load_settings(&args.config, CommandScope::Backtest)?;
    let bt_settings = backtest_settings(&settings);

    let history = load_price_history_csv(&args.history_path)
        .with_context(|| format!("load price history failed: {}", args.history_path))?;
    let weights: WeightMap = read_json_file(&args.weights_path, "weights")?;

    let weight_bt =
        backtest_weights(&history, &weights, &bt_settings).context("weight backtest failed")?;

    let holdings = match args.budget {
        Some(budget) => {
            let kind = parse_allocator(&args.allocator)?;
            let allocator = allocator_settings(&settings)?.build(kind);
            let allocation = allocator
                .allocate(&weights, &history.latest_prices(), budget)
                .context("allocation at last close failed")?;
            let backtest = backtest_holdings(&history, &allocation, &bt_settings)
                .context("holdings backtest failed")?;
            Some(HoldingsOutput {
                allocation,
                backtest,
            })
        }
        None => None,
    };

    let out = BacktestOutput {
        config_hash: loaded.config_hash,
        weights: weight_bt,
        holdings,
    };

    if args.json {
        return print_json(&out);
    }

    println!("config_hash={}", out.config_hash);
    if let (Some(first), Some(last)) = (out.weights.dates.first(), out.weights.dates.last()) {
        println!("period={first}..{last}");
    }
    print_metrics("weights", &out.weights.metrics);
    for (bench, curve) in &out.weights.benchmarks {
        if let Some(growth) = curve.last() {
            println!("benchmark.{bench}.total_return_pct={:.4}", (growth - 1.0) * 100.0);
        }
    }
    if !out.weights.skipped.is_empty() {
        println!("skipped={}", out.weights.skipped.join(","));
    }

    if let Some(h) = &out.holdings {
        for (ticker, n) in &h.allocation.shares {
            println!("shares.{ticker}={n}");
        }
        println!("leftover={}", h.allocation.leftover);
        if let (Some(start), Some(end)) = (h.backtest.values.first(), h.backtest.values.last()) {
            println!("holdings.start_value={start}");
            println!("holdings.end_value={end}");
        }
        print_metrics("holdings", &h.backtest.metrics);
    }
    Ok(())
}

fn print_metrics(prefix: &str, m: &PerformanceMetrics) {
    println!("{prefix}.days={}", m.days);
    println!("{prefix}.total_return_pct={:.4}", m.total_return_pct);
    println!("{prefix}.annualized_return_pct={:.4}", m.annualized_return_pct);
    println!("{prefix}.annualized_volatility_pct={:.4}", m.annualized_volatility_pct);
    println!("{prefix}.sharpe={:.4}", m.sharpe);
    println!("{prefix}.sortino={:.4}", m.sortino);
    println!("{prefix}.max_drawdown={:.4}", m.max_drawdown);
    if let (Some(beta), Some(alpha)) = (m.beta, m.alpha_pct) {
        println!("{prefix}.beta={beta:.4}");
        println!("{prefix}.alpha_pct={alpha:.4}");
    }
}
