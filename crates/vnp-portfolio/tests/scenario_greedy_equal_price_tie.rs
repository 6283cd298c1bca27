//! Two equally weighted, equally priced names with cash for three shares.
//!
//! Relaxation: x ≈ 1.667 each. Floor: one share each, 400 left. Top-up: one
//! more share, tie broken by ticker (equal prices), so A gets it.

use vnp_portfolio::{asset_map, GreedyAllocator, GreedySettings, TieBreak};

#[test]
fn scenario_equal_price_tie_resolves_to_first_ticker() {
    let w = asset_map([("A", 0.5), ("B", 0.5)]);
    let p = asset_map([("A", 300.0), ("B", 300.0)]);

    for tie_break in [TieBreak::PriceThenAsset, TieBreak::Asset] {
        let report = GreedyAllocator::new(GreedySettings {
            tie_break,
            ..GreedySettings::default()
        })
        .allocate_with_report(&w, &p, 1_000.0)
        .unwrap();

        assert_eq!(report.floored.values().sum::<u64>(), 2);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].asset, "A");
        assert_eq!(report.steps[0].remaining_before, 400.0);
        assert_eq!(report.steps[0].remaining_after, 100.0);

        assert_eq!(report.allocation.share_count("A"), 2);
        assert_eq!(report.allocation.share_count("B"), 1);
        assert_eq!(report.allocation.leftover, 100.0);
    }
}
