//! Greedy allocator when the continuous relaxation does not converge.
//!
//! With a one-iteration solver cap phase 1 gives up. That is a warning, not an
//! error: phase 2 starts from the naive proportional floor and phase 3 tops up
//! as usual.

use vnp_portfolio::{asset_map, GreedyAllocator, GreedySettings, RelaxationStatus};

#[test]
fn scenario_iteration_cap_falls_back_to_naive_floor() {
    let w = asset_map([("ACB", 0.5), ("MWG", 0.3), ("SSI", 0.2)]);
    let p = asset_map([("ACB", 125.0), ("MWG", 310.0), ("SSI", 457.0)]);
    let budget = 100_000.0;

    let allocator = GreedyAllocator::new(GreedySettings {
        solver_max_iter: 1,
        ..GreedySettings::default()
    });
    let report = allocator.allocate_with_report(&w, &p, budget).unwrap();

    assert!(!report.converged);
    assert!(matches!(report.relaxation, RelaxationStatus::Failed(_)));

    // floor(w·B/p): 400, 96, 43
    assert_eq!(report.floored.get("ACB"), Some(&400));
    assert_eq!(report.floored.get("MWG"), Some(&96));
    assert_eq!(report.floored.get("SSI"), Some(&43));
    assert_eq!(report.repaired_shares, 0);

    // 589 left: SSI is furthest under target, then only ACB still fits.
    let bought: Vec<&str> = report.steps.iter().map(|s| s.asset.as_str()).collect();
    assert_eq!(bought, vec!["SSI", "ACB"]);
    for step in &report.steps {
        assert!(step.price <= step.remaining_before);
    }

    let alloc = &report.allocation;
    assert_eq!(alloc.share_count("ACB"), 401);
    assert_eq!(alloc.share_count("MWG"), 96);
    assert_eq!(alloc.share_count("SSI"), 44);
    assert_eq!(alloc.leftover, 7.0);
    let check = alloc.check_budget(&p, budget);
    assert!(check.within(1.0));
}
