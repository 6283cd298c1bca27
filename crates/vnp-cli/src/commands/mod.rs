//! Command handler modules for the `vnp` binary.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod allocate;
pub mod backtest;
pub mod run;

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use vnp_backtest::BacktestSettings;
use vnp_config::{report_unused_keys, CommandScope, LoadedConfig, Settings, UnusedKeyPolicy};
use vnp_portfolio::{
    AllocatorKind, AllocatorSettings, GreedySettings, IntegerSettings, TieBreak, WeightPolicy,
};
use vnp_strategy::{RecommendationWeights, RunnerSettings, StrategyKind};

/// Config flags shared by every allocating command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Layered config paths in merge order
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Fail instead of warn when the config has keys this command never reads
    #[arg(long, default_value_t = false)]
    pub strict_config: bool,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load the layered config (or the empty one) and its typed settings.
pub fn load_settings(args: &ConfigArgs, scope: CommandScope) -> Result<(LoadedConfig, Settings)> {
    let loaded = if args.config_paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        let path_refs: Vec<&str> = args.config_paths.iter().map(|s| s.as_str()).collect();
        vnp_config::load_layered_yaml(&path_refs)?
    };

    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(scope, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            scope = %report.scope,
            unused = ?report.unused_leaf_pointers,
            "config keys not read by this command"
        );
    }

    let settings = loaded.settings()?;
    Ok((loaded, settings))
}

/// Parse a CLI or config allocator name into an [`AllocatorKind`].
pub fn parse_allocator(name: &str) -> Result<AllocatorKind> {
    AllocatorKind::parse(name).with_context(|| {
        format!("invalid allocator '{name}'. expected one of: integer | greedy")
    })
}

pub fn allocator_settings(settings: &Settings) -> Result<AllocatorSettings> {
    let a = &settings.allocation;
    let tie_break = TieBreak::parse(&a.greedy.tie_break).with_context(|| {
        format!(
            "invalid allocation.greedy.tie_break '{}'. expected one of: price_then_asset | asset",
            a.greedy.tie_break
        )
    })?;

    Ok(AllocatorSettings {
        integer: IntegerSettings {
            max_nodes: a.integer.max_nodes,
            integrality_tolerance: a.integer.integrality_tolerance,
            absolute_gap: a.integer.absolute_gap,
            budget_tolerance: a.budget_tolerance,
            ..IntegerSettings::default()
        },
        greedy: GreedySettings {
            max_iterations: a.greedy.max_iterations,
            tie_break,
            budget_tolerance: a.budget_tolerance,
            ..GreedySettings::default()
        },
    })
}

pub fn runner_settings(settings: &Settings) -> Result<RunnerSettings> {
    let mut allocator_overrides = BTreeMap::new();
    for (strategy, allocator) in &settings.allocation.allocator_overrides {
        let kind = StrategyKind::parse(strategy).with_context(|| {
            format!("unknown strategy '{strategy}' in allocation.allocator_overrides")
        })?;
        allocator_overrides.insert(kind, parse_allocator(allocator)?);
    }

    Ok(RunnerSettings {
        allocators: allocator_settings(settings)?,
        weights: WeightPolicy {
            clean_cutoff: settings.weights.clean_cutoff,
            sum_tolerance: settings.weights.sum_tolerance,
            ..WeightPolicy::default()
        },
        allocator_overrides,
    })
}

pub fn backtest_settings(settings: &Settings) -> BacktestSettings {
    BacktestSettings {
        trading_days_per_year: settings.backtest.trading_days_per_year,
        benchmarks: settings.backtest.benchmarks.clone(),
    }
}

pub fn recommendation_weights(settings: &Settings) -> RecommendationWeights {
    let r = &settings.recommendation;
    RecommendationWeights {
        sharpe: r.sharpe,
        expected_return: r.expected_return,
        diversification: r.diversification,
        capital_utilization: r.capital_utilization,
    }
}

/// Read a UTF-8 JSON file (BOM tolerated) into `T`.
pub fn read_json_file<T: DeserializeOwned>(path: &str, what: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {what} failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{what} must be UTF-8 text"))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{what} must contain valid JSON: {path}"))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output json failed")?;
    println!("{s}");
    Ok(())
}
