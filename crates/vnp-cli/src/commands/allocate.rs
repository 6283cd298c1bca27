//! `vnp allocate`: one weight vector, one allocator, whole shares.

use anyhow::{Context, Result};
use serde::Serialize;
use vnp_config::CommandScope;
use vnp_portfolio::{
    compute_allocation_metrics, Allocation, AllocationMetrics, AllocatorKind, BudgetCheck,
    GreedyAllocator, IntegerAllocator, PriceMap, RefinementReport, SearchStats, WeightMap,
};

use super::{
    allocator_settings, load_settings, parse_allocator, print_json, read_json_file, ConfigArgs,
};

pub struct AllocateArgs {
    pub weights_path: String,
    pub prices_path: String,
    pub budget: f64,
    pub allocator: String,
    pub config: ConfigArgs,
    pub json: bool,
}

#[derive(Serialize)]
struct AllocateOutput {
    allocator: AllocatorKind,
    budget: f64,
    config_hash: String,
    allocation: Allocation,
    budget_check: BudgetCheck,
    metrics: AllocationMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<SearchStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refinement: Option<RefinementReport>,
}

pub fn allocate(args: AllocateArgs) -> Result<()> {
    let (loaded, settings) = load_settings(&args.config, CommandScope::Allocate)?;
    let allocators = allocator_settings(&settings)?;
    let kind = parse_allocator(&args.allocator)?;

    let weights: WeightMap = read_json_file(&args.weights_path, "weights")?;
    let prices: PriceMap = read_json_file(&args.prices_path, "prices")?;

    let (allocation, search, refinement) = match kind {
        AllocatorKind::Integer => {
            let (alloc, stats) = IntegerAllocator::new(allocators.integer)
                .allocate_with_stats(&weights, &prices, args.budget)
                .context("allocation failed")?;
            (alloc, Some(stats), None)
        }
        AllocatorKind::Greedy => {
            let report = GreedyAllocator::new(allocators.greedy)
                .allocate_with_report(&weights, &prices, args.budget)
                .context("allocation failed")?;
            (report.allocation.clone(), None, Some(report))
        }
    };

    let out = AllocateOutput {
        allocator: kind,
        budget: args.budget,
        config_hash: loaded.config_hash,
        budget_check: allocation.check_budget(&prices, args.budget),
        metrics: compute_allocation_metrics(&weights, &allocation, &prices, args.budget),
        allocation,
        search,
        refinement,
    };

    if args.json {
        return print_json(&out);
    }

    println!("allocator={}", out.allocator.as_str());
    println!("budget={}", out.budget);
    println!("config_hash={}", out.config_hash);
    for (ticker, n) in &out.allocation.shares {
        println!("shares.{ticker}={n}");
    }
    println!("spent={}", out.budget_check.spent);
    println!("leftover={}", out.allocation.leftover);
    println!("budget_drift={}", out.budget_check.drift);
    println!("positions={}", out.metrics.position_count);
    println!("total_shares={}", out.metrics.total_shares);
    println!("capital_utilization_pct={:.4}", out.metrics.capital_utilization);
    println!("diversification_index={:.4}", out.metrics.diversification_index);
    println!("tracking_deviation={:.2}", out.metrics.tracking_deviation);
    if let Some(stats) = &out.search {
        println!(
            "search nodes={} pruned={} incumbent_updates={} truncated={} objective={:.2} lower_bound={:.2} gap={:.2}",
            stats.nodes,
            stats.pruned,
            stats.incumbent_updates,
            stats.truncated,
            stats.objective,
            stats.lower_bound,
            stats.gap()
        );
    }
    if let Some(report) = &out.refinement {
        println!(
            "refinement converged={} top_up_steps={} repaired_shares={} iteration_cap_hit={}",
            report.converged,
            report.steps.len(),
            report.repaired_shares,
            report.iteration_cap_hit
        );
    }
    Ok(())
}
