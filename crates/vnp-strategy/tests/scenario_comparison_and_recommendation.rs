//! Run, compare and rank a small book end to end.

use vnp_portfolio::asset_map;
use vnp_strategy::{
    compare, recommend, OptimizerOutput, PortfolioResult, RecommendationWeights, RunContext,
    StrategyKind, StrategyRunner,
};

#[test]
fn scenario_compare_then_recommend() {
    let prices = asset_map([("A", 100.0), ("B", 200.0), ("C", 50.0)]);
    let ctx = RunContext::new(1_000.0, None).unwrap();

    let outputs = vec![
        OptimizerOutput {
            strategy: StrategyKind::MaxSharpe,
            weights: asset_map([("A", 0.6), ("B", 0.4)]),
            expected_return: 0.25,
            volatility: Some(0.30),
            sharpe: Some(0.77),
            cvar: None,
            cdar: None,
        },
        OptimizerOutput {
            strategy: StrategyKind::MinVolatility,
            weights: asset_map([("A", 0.3), ("B", 0.4), ("C", 0.3)]),
            expected_return: 0.12,
            volatility: Some(0.15),
            sharpe: Some(0.67),
            cvar: None,
            cdar: None,
        },
    ];

    let summary = StrategyRunner::default().run_all(&ctx, &outputs, &prices);
    assert!(summary.failures.is_empty());

    let rows = compare(&summary.results);
    assert_eq!(rows.len(), 2);

    let max_sharpe = &rows[0];
    assert_eq!(max_sharpe.strategy, StrategyKind::MaxSharpe);
    assert!((max_sharpe.expected_return_pct - 25.0).abs() < 1e-9);
    assert!((max_sharpe.volatility_pct - 30.0).abs() < 1e-9);
    assert_eq!(max_sharpe.stock_count, 2);
    assert_eq!(max_sharpe.total_shares, 8);
    assert!((max_sharpe.capital_utilization_pct - 100.0).abs() < 1e-9);
    assert_eq!(
        max_sharpe.invested,
        summary.results[0].invested()
    );

    // min_volatility: 3 A + 2 B + 6 C = 300 + 400 + 300
    let min_vol = &rows[1];
    assert_eq!(min_vol.stock_count, 3);
    assert_eq!(min_vol.total_shares, 11);
    assert!(min_vol.diversification_index > max_sharpe.diversification_index);

    let cards = recommend(&rows, &RecommendationWeights::default());
    assert_eq!(cards.len(), 2);
    // max_sharpe wins sharpe (40) and return (30); min_volatility wins diversification (20).
    assert_eq!(cards[0].strategy, StrategyKind::MaxSharpe);
    assert!((cards[0].total - 75.0).abs() < 1e-9);
    assert!((cards[1].total - 25.0).abs() < 1e-9);
}
