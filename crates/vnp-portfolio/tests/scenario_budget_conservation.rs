//! spent + leftover == budget for both allocators, leftover never negative.

use vnp_portfolio::{
    asset_map, AllocatorKind, AllocatorSettings, DiscreteAllocator, PriceMap, WeightMap,
};

fn cases() -> Vec<(WeightMap, PriceMap, f64)> {
    vec![
        (
            asset_map([("A", 0.6), ("B", 0.4)]),
            asset_map([("A", 100.0), ("B", 200.0)]),
            1_000.0,
        ),
        (
            asset_map([("FPT", 0.2), ("HPG", 0.3), ("MBB", 0.1), ("VNM", 0.4)]),
            asset_map([
                ("FPT", 118_300.0),
                ("HPG", 27_450.0),
                ("MBB", 23_900.0),
                ("VNM", 64_200.0),
            ]),
            100_000_000.0,
        ),
        (
            asset_map([("X", 0.7), ("Y", 0.3), ("Z", 0.0)]),
            asset_map([("X", 33.3), ("Y", 71.7)]),
            777.0,
        ),
    ]
}

#[test]
fn scenario_budget_is_conserved_by_both_allocators() {
    let settings = AllocatorSettings::default();
    for kind in [AllocatorKind::Integer, AllocatorKind::Greedy] {
        let allocator = settings.build(kind);
        for (w, p, budget) in cases() {
            let alloc = allocator.allocate(&w, &p, budget).unwrap();
            let check = alloc.check_budget(&p, budget);

            assert!(
                check.within(1.0),
                "{} drifted by {} on budget {budget}",
                allocator.name(),
                check.drift
            );
            assert!(alloc.leftover >= 0.0, "{} overspent", allocator.name());
            assert!(alloc.shares.values().all(|n| *n > 0));
            assert!(alloc.shares.keys().all(|a| w.get(a).copied().unwrap_or(0.0) > 0.0));
        }
    }
}

#[test]
fn scenario_zero_weight_asset_needs_no_price() {
    let settings = AllocatorSettings::default();
    let w = asset_map([("X", 1.0), ("Y", 0.0)]);
    let p = asset_map([("X", 10.0)]);
    for kind in [AllocatorKind::Integer, AllocatorKind::Greedy] {
        let alloc = settings.build(kind).allocate(&w, &p, 95.0).unwrap();
        assert_eq!(alloc.share_count("X"), 9);
        assert_eq!(alloc.share_count("Y"), 0);
        assert!((alloc.leftover - 5.0).abs() < 1e-9);
    }
}
