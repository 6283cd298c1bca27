//! A failing strategy is recorded and never blocks the remaining strategies.

use vnp_portfolio::{asset_map, AllocationError, AllocatorKind};
use vnp_strategy::{
    OptimizerOutput, RunContext, StrategyError, StrategyKind, StrategyRunner,
};

fn output(strategy: StrategyKind, weights: &[(&str, f64)]) -> OptimizerOutput {
    OptimizerOutput {
        strategy,
        weights: asset_map(weights.iter().copied()),
        expected_return: 0.18,
        volatility: Some(0.24),
        sharpe: Some(0.67),
        cvar: Some(0.031),
        cdar: Some(0.085),
    }
}

#[test]
fn scenario_six_strategies_two_failures() {
    let prices = asset_map([
        ("FPT", 118_300.0),
        ("HPG", 27_450.0),
        ("VCB", 91_000.0),
        ("VNM", 64_200.0),
    ]);
    let ctx = RunContext::new(100_000_000.0, Some("abc123".to_string())).unwrap();

    let outputs = vec![
        output(StrategyKind::Markowitz, &[("FPT", 0.4), ("HPG", 0.6)]),
        output(StrategyKind::MaxSharpe, &[("FPT", 0.5), ("VNM", 0.5)]),
        // No price for SSI.
        output(StrategyKind::MinVolatility, &[("SSI", 0.3), ("VCB", 0.7)]),
        output(StrategyKind::MinCvar, &[("HPG", 0.5), ("VNM", 0.5)]),
        // Negative weight.
        output(StrategyKind::MinCdar, &[("HPG", 1.2), ("VNM", -0.2)]),
        output(StrategyKind::Hrp, &[("FPT", 0.25), ("HPG", 0.25), ("VCB", 0.25), ("VNM", 0.25)]),
    ];

    let summary = StrategyRunner::default().run_all(&ctx, &outputs, &prices);

    assert_eq!(summary.run_id, ctx.run_id);
    assert_eq!(summary.results.len(), 4);
    assert_eq!(summary.failures.len(), 2);

    let failed: Vec<StrategyKind> = summary.failures.iter().map(|f| f.strategy).collect();
    assert_eq!(failed, vec![StrategyKind::MinVolatility, StrategyKind::MinCdar]);

    assert!(matches!(
        summary.failures[0].error,
        StrategyError::Allocation {
            source: AllocationError::MissingPrice { .. },
            ..
        }
    ));
    assert!(matches!(
        summary.failures[1].error,
        StrategyError::Weights { .. }
    ));

    // Survivors keep input order and their default allocators.
    let ok: Vec<StrategyKind> = summary.results.iter().map(|r| r.strategy).collect();
    assert_eq!(
        ok,
        vec![
            StrategyKind::Markowitz,
            StrategyKind::MaxSharpe,
            StrategyKind::MinCvar,
            StrategyKind::Hrp
        ]
    );
    let hrp = summary.result(StrategyKind::Hrp).unwrap();
    assert_eq!(hrp.allocator, AllocatorKind::Greedy);
    assert!(hrp.refinement.is_some());

    for r in &summary.results {
        assert!(r.budget_check.within(1.0), "{}", r.strategy);
        assert!(r.allocation.leftover >= 0.0);
        assert!(!r.allocation.is_empty());
    }
}

#[test]
fn scenario_unaffordable_book_fails_integer_but_not_greedy() {
    let prices = asset_map([("VCB", 91_000.0), ("VIC", 44_500.0)]);
    let ctx = RunContext::new(40_000.0, None).unwrap();
    let outputs = vec![
        output(StrategyKind::MaxSharpe, &[("VCB", 0.5), ("VIC", 0.5)]),
        output(StrategyKind::Hrp, &[("VCB", 0.5), ("VIC", 0.5)]),
    ];

    let summary = StrategyRunner::default().run_all(&ctx, &outputs, &prices);

    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        summary.failures[0].error,
        StrategyError::Allocation {
            source: AllocationError::InfeasibleAllocation { .. },
            ..
        }
    ));
    let hrp = summary.result(StrategyKind::Hrp).unwrap();
    assert!(hrp.allocation.is_empty());
    assert_eq!(hrp.allocation.leftover, 40_000.0);
}
