//! vnp-portfolio: allocator contract
//!
//! Both allocators share one contract: (weights, latest prices, budget) ->
//! whole-share counts plus leftover cash. This module owns that contract, the
//! error taxonomy, input validation and the bookkeeping both implementations
//! rely on (spend, tracking objective, budget repair, invariant check).
//!
//! Design notes:
//! - Zero weights are dropped before allocation and need no price.
//! - Weights are NOT renormalized here; their exact sum drives the budget math.
//! - `leftover` is always the residual `budget - spent`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::greedy::{GreedyAllocator, GreedySettings};
use crate::integer::{IntegerAllocator, IntegerSettings};
use crate::types::{Allocation, Budget, BudgetCheck, PriceMap, WeightMap};

/// Allowed |spent + leftover - budget| in currency units.
pub const DEFAULT_BUDGET_TOLERANCE: f64 = 1.0;

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors produced during allocation.
#[derive(Clone, Debug, PartialEq)]
pub enum AllocationError {
    /// Budget is zero, negative, NaN or infinite.
    InvalidBudget { budget: f64 },
    /// A weight is NaN, infinite or negative.
    InvalidWeight { asset: String, weight: f64 },
    /// A positively weighted asset has no strictly positive price.
    MissingPrice { asset: String },
    /// No positively weighted asset can be bought with the budget.
    InfeasibleAllocation { budget: f64, cheapest_price: f64 },
    /// The numerical solver could not be set up or produced nothing usable.
    Solver { detail: String },
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBudget { budget } => write!(f, "budget must be > 0, got {budget}"),
            Self::InvalidWeight { asset, weight } => {
                write!(f, "invalid weight {weight} for asset '{asset}'")
            }
            Self::MissingPrice { asset } => {
                write!(f, "no positive price for weighted asset '{asset}'")
            }
            Self::InfeasibleAllocation {
                budget,
                cheapest_price,
            } => write!(
                f,
                "no feasible allocation: cheapest weighted asset costs {cheapest_price} > budget {budget}"
            ),
            Self::Solver { detail } => write!(f, "solver failure: {detail}"),
        }
    }
}

impl std::error::Error for AllocationError {}

// ─── Contract ────────────────────────────────────────────────────────────────

/// Turns continuous target weights into whole-share counts within a budget.
///
/// Implementations are pure and deterministic: identical inputs give
/// identical allocations.
pub trait DiscreteAllocator {
    fn name(&self) -> &'static str;

    fn allocate(
        &self,
        weights: &WeightMap,
        prices: &PriceMap,
        budget: f64,
    ) -> Result<Allocation, AllocationError>;
}

/// Which allocator to use for a strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorKind {
    /// Best-bound branch-and-bound over knapsack relaxations.
    Integer,
    /// Continuous QP, floor, greedy top-up.
    Greedy,
}

impl AllocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocatorKind::Integer => "integer",
            AllocatorKind::Greedy => "greedy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "lp" | "milp" => Some(AllocatorKind::Integer),
            "greedy" => Some(AllocatorKind::Greedy),
            _ => None,
        }
    }
}

/// Settings for both allocators, so callers can build either by kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocatorSettings {
    pub integer: IntegerSettings,
    pub greedy: GreedySettings,
}

impl AllocatorSettings {
    pub fn build(&self, kind: AllocatorKind) -> Box<dyn DiscreteAllocator> {
        match kind {
            AllocatorKind::Integer => Box::new(IntegerAllocator::new(self.integer.clone())),
            AllocatorKind::Greedy => Box::new(GreedyAllocator::new(self.greedy.clone())),
        }
    }
}

// ─── Shared bookkeeping ──────────────────────────────────────────────────────

/// One positively weighted, priced asset.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Slot {
    pub asset: String,
    pub weight: f64,
    pub price: f64,
}

/// Validated allocator inputs. Slots are in ticker order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Prepared {
    pub slots: Vec<Slot>,
    pub budget: f64,
}

impl Prepared {
    pub fn spend(&self, counts: &[u64]) -> f64 {
        self.slots
            .iter()
            .zip(counts)
            .map(|(s, n)| s.price * *n as f64)
            .sum()
    }

    /// Σ|w·B − p·x| + (B − Σ p·x), in currency units.
    pub fn tracking_objective(&self, counts: &[u64]) -> f64 {
        let dev: f64 = self
            .slots
            .iter()
            .zip(counts)
            .map(|(s, n)| (s.weight * self.budget - s.price * *n as f64).abs())
            .sum();
        dev + (self.budget - self.spend(counts))
    }

    /// count × price / budget for one slot.
    pub fn actual_weight(&self, idx: usize, count: u64) -> f64 {
        self.slots[idx].price * count as f64 / self.budget
    }

    /// Cheapest price among the slots, if any.
    pub fn cheapest_price(&self) -> Option<f64> {
        self.slots.iter().map(|s| s.price).reduce(f64::min)
    }

    /// Remove single shares from the most over-weight holding until spend
    /// fits the budget. Returns the number of shares removed.
    pub fn repair_to_budget(&self, counts: &mut [u64]) -> u64 {
        let mut removed = 0;
        while self.spend(counts) > self.budget {
            let mut worst: Option<(usize, f64)> = None;
            for (i, n) in counts.iter().enumerate() {
                if *n == 0 {
                    continue;
                }
                let excess = self.actual_weight(i, *n) - self.slots[i].weight;
                if worst.map_or(true, |(_, e)| excess > e) {
                    worst = Some((i, excess));
                }
            }
            match worst {
                Some((i, _)) => {
                    counts[i] -= 1;
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }

    pub fn to_allocation(&self, counts: &[u64]) -> Allocation {
        let shares: BTreeMap<String, u64> = self
            .slots
            .iter()
            .zip(counts)
            .filter(|(_, n)| **n > 0)
            .map(|(s, n)| (s.asset.clone(), *n))
            .collect();
        Allocation {
            shares,
            leftover: self.budget - self.spend(counts),
        }
    }
}

/// Validate (weights, prices, budget) and collect the positively weighted assets.
pub(crate) fn prepare(
    weights: &WeightMap,
    prices: &PriceMap,
    budget: f64,
) -> Result<Prepared, AllocationError> {
    let budget = Budget::new(budget)?.amount();

    let mut slots = Vec::with_capacity(weights.len());
    for (asset, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AllocationError::InvalidWeight {
                asset: asset.clone(),
                weight,
            });
        }
        if weight == 0.0 {
            continue;
        }
        let price = prices
            .get(asset)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| AllocationError::MissingPrice {
                asset: asset.clone(),
            })?;
        slots.push(Slot {
            asset: asset.clone(),
            weight,
            price,
        });
    }

    Ok(Prepared { slots, budget })
}

/// Recheck `spent + leftover == budget`. Drift beyond `tolerance` is logged,
/// never raised: it can only come from a bookkeeping bug in an allocator.
pub(crate) fn verify_budget_invariant(
    allocator: &str,
    allocation: &Allocation,
    prices: &PriceMap,
    budget: f64,
    tolerance: f64,
) -> BudgetCheck {
    let check = allocation.check_budget(prices, budget);
    if !check.within(tolerance) {
        warn!(
            allocator,
            budget,
            spent = check.spent,
            leftover = check.leftover,
            drift = check.drift,
            "budget invariant drift exceeds tolerance"
        );
    }
    check
}

// ─── Tests ────────────────────────────────────────────────────────────────────
