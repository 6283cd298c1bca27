use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::allocator::AllocationError;

/// Target weights keyed by ticker (fraction of budget, expected to sum to ~1).
pub type WeightMap = BTreeMap<String, f64>;

/// Latest unit price keyed by ticker, in the same currency as the budget.
pub type PriceMap = BTreeMap<String, f64>;

/// Helper to build a `WeightMap` or `PriceMap` with minimal boilerplate.
pub fn asset_map<I, S>(items: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    items.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Total investable cash. Always strictly positive and finite.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Budget(f64);

impl Budget {
    pub fn new(amount: f64) -> Result<Self, AllocationError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AllocationError::InvalidBudget { budget: amount });
        }
        Ok(Self(amount))
    }

    pub fn amount(self) -> f64 {
        self.0
    }
}

/// Discrete allocation: whole-share counts per ticker plus unspent cash.
///
/// Only tickers with a count > 0 are stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub shares: BTreeMap<String, u64>,
    pub leftover: f64,
}

impl Allocation {
    /// The all-cash allocation.
    pub fn empty(budget: f64) -> Self {
        Self {
            shares: BTreeMap::new(),
            leftover: budget,
        }
    }

    /// Build from raw counts; zero counts are dropped and `leftover` is the
    /// residual `budget - spent`, never computed independently.
    pub fn from_counts<'a, I>(counts: I, prices: &PriceMap, budget: f64) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let shares: BTreeMap<String, u64> = counts
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(a, n)| (a.to_string(), n))
            .collect();
        let spent = spent_for(&shares, prices);
        Self {
            shares,
            leftover: budget - spent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Number of tickers held.
    pub fn position_count(&self) -> usize {
        self.shares.len()
    }

    pub fn total_shares(&self) -> u64 {
        self.shares.values().sum()
    }

    pub fn share_count(&self, asset: &str) -> u64 {
        self.shares.get(asset).copied().unwrap_or(0)
    }

    /// Σ count × price. Tickers without a price contribute nothing.
    pub fn total_spent(&self, prices: &PriceMap) -> f64 {
        spent_for(&self.shares, prices)
    }

    /// count × price / budget per held ticker.
    pub fn actual_weights(&self, prices: &PriceMap, budget: f64) -> WeightMap {
        self.shares
            .iter()
            .map(|(a, n)| {
                let px = prices.get(a).copied().unwrap_or(0.0);
                (a.clone(), *n as f64 * px / budget)
            })
            .collect()
    }

    /// Recompute spend and compare `spent + leftover` against `budget`.
    pub fn check_budget(&self, prices: &PriceMap, budget: f64) -> BudgetCheck {
        let spent = self.total_spent(prices);
        BudgetCheck {
            spent,
            leftover: self.leftover,
            drift: (spent + self.leftover - budget).abs(),
        }
    }
}

fn spent_for(shares: &BTreeMap<String, u64>, prices: &PriceMap) -> f64 {
    shares
        .iter()
        .map(|(a, n)| *n as f64 * prices.get(a).copied().unwrap_or(0.0))
        .sum()
}

/// Result of the budget-conservation check.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct BudgetCheck {
    pub spent: f64,
    pub leftover: f64,
    /// |spent + leftover - budget|
    pub drift: f64,
}

impl BudgetCheck {
    pub fn within(&self, tolerance: f64) -> bool {
        self.drift <= tolerance && self.leftover >= -tolerance
    }
}

/// actual_weight - target_weight for every ticker in either map.
///
/// Negative values are under-allocated tickers.
pub fn target_errors(
    weights: &WeightMap,
    allocation: &Allocation,
    prices: &PriceMap,
    budget: f64,
) -> WeightMap {
    let actual = allocation.actual_weights(prices, budget);
    let mut out = WeightMap::new();
    for (a, w) in weights {
        out.insert(a.clone(), actual.get(a).copied().unwrap_or(0.0) - w);
    }
    for (a, aw) in &actual {
        out.entry(a.clone()).or_insert(*aw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_rejects_non_positive_and_non_finite() {
        assert!(Budget::new(0.0).is_err());
        assert!(Budget::new(-5.0).is_err());
        assert!(Budget::new(f64::NAN).is_err());
        assert!(Budget::new(f64::INFINITY).is_err());
        assert_eq!(Budget::new(1_000.0).unwrap().amount(), 1_000.0);
    }

    #[test]
    fn from_counts_drops_zeros_and_derives_leftover() {
        let prices = asset_map([("FPT", 100.0), ("VNM", 200.0)]);
        let alloc = Allocation::from_counts([("FPT", 3), ("VNM", 0)], &prices, 1_000.0);
        assert_eq!(alloc.position_count(), 1);
        assert_eq!(alloc.share_count("FPT"), 3);
        assert_eq!(alloc.share_count("VNM"), 0);
        assert_eq!(alloc.leftover, 700.0);
        assert!(alloc.check_budget(&prices, 1_000.0).within(1.0));
    }

    #[test]
    fn target_errors_include_unheld_targets() {
        let prices = asset_map([("FPT", 100.0), ("VNM", 200.0)]);
        let weights = asset_map([("FPT", 0.5), ("VNM", 0.5)]);
        let alloc = Allocation::from_counts([("FPT", 6)], &prices, 1_000.0);
        let errs = target_errors(&weights, &alloc, &prices, 1_000.0);
        assert!((errs["FPT"] - 0.1).abs() < 1e-12);
        assert!((errs["VNM"] + 0.5).abs() < 1e-12);
    }
}
