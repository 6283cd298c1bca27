use serde::Serialize;

use crate::types::{Allocation, PriceMap, WeightMap};

/// Summary of one discrete allocation against its targets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllocationMetrics {
    pub position_count: usize,
    pub total_shares: u64,
    /// Σ count × price
    pub total_invested: f64,
    pub leftover: f64,
    /// invested / (invested + leftover) × 100
    pub capital_utilization: f64,
    /// (1 − Σw²) / (1 − 1/n), n counting every ticker in the weight map.
    pub diversification_index: f64,
    /// Σ |actual − target| in weight units.
    pub tracking_deviation: f64,
}

/// Herfindahl-based diversification: 1 is equal-weight, 0 is a single name.
///
/// Zero weights still count towards n.
pub fn diversification_index(weights: &WeightMap) -> f64 {
    let n = weights.len();
    if n <= 1 {
        return 0.0;
    }
    let herfindahl: f64 = weights.values().map(|w| w * w).sum();
    (1.0 - herfindahl) / (1.0 - 1.0 / n as f64)
}

/// Σ |actual − target| across every ticker in either the targets or the holdings.
pub fn tracking_deviation(
    weights: &WeightMap,
    allocation: &Allocation,
    prices: &PriceMap,
    budget: f64,
) -> f64 {
    crate::types::target_errors(weights, allocation, prices, budget)
        .values()
        .map(|e| e.abs())
        .sum()
}

pub fn compute_allocation_metrics(
    weights: &WeightMap,
    allocation: &Allocation,
    prices: &PriceMap,
    budget: f64,
) -> AllocationMetrics {
    let total_invested = allocation.total_spent(prices);
    let total_capital = total_invested + allocation.leftover;
    let capital_utilization = if total_capital > 0.0 {
        total_invested / total_capital * 100.0
    } else {
        0.0
    };

    AllocationMetrics {
        position_count: allocation.position_count(),
        total_shares: allocation.total_shares(),
        total_invested,
        leftover: allocation.leftover,
        capital_utilization,
        diversification_index: diversification_index(weights),
        tracking_deviation: tracking_deviation(weights, allocation, prices, budget),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::asset_map;

    #[test]
    fn equal_weights_are_fully_diversified() {
        let w = asset_map([("A", 0.25), ("B", 0.25), ("C", 0.25), ("D", 0.25)]);
        assert!((diversification_index(&w) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_name_has_zero_diversification() {
        assert_eq!(diversification_index(&asset_map([("A", 1.0), ("B", 0.0)])), 0.0);
        assert_eq!(diversification_index(&WeightMap::new()), 0.0);
    }

    #[test]
    fn zero_weights_count_towards_universe_size() {
        let w = asset_map([("A", 0.5), ("B", 0.5), ("C", 0.0)]);
        // (1 - 0.5) / (1 - 1/3)
        assert!((diversification_index(&w) - 0.75).abs() < 1e-12);
        let held = asset_map([("A", 0.5), ("B", 0.5)]);
        assert!((diversification_index(&held) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_for_exact_fill() {
        let w = asset_map([("A", 0.6), ("B", 0.4)]);
        let p = asset_map([("A", 100.0), ("B", 200.0)]);
        let alloc = Allocation::from_counts([("A", 6), ("B", 2)], &p, 1_000.0);
        let m = compute_allocation_metrics(&w, &alloc, &p, 1_000.0);
        assert_eq!(m.position_count, 2);
        assert_eq!(m.total_shares, 8);
        assert_eq!(m.total_invested, 1_000.0);
        assert!((m.capital_utilization - 100.0).abs() < 1e-9);
        assert!(m.tracking_deviation < 1e-9);
        // (1 - 0.52) / 0.5
        assert!((m.diversification_index - 0.96).abs() < 1e-9);
    }

    #[test]
    fn partial_fill_reports_utilization() {
        let w = asset_map([("A", 1.0)]);
        let p = asset_map([("A", 300.0)]);
        let alloc = Allocation::from_counts([("A", 3)], &p, 1_000.0);
        let m = compute_allocation_metrics(&w, &alloc, &p, 1_000.0);
        assert!((m.capital_utilization - 90.0).abs() < 1e-9);
        assert!((m.tracking_deviation - 0.1).abs() < 1e-9);
    }
}
