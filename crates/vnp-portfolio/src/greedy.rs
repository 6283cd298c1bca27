//! Greedy quadratic-refinement allocator.
//!
//! Used where only continuous weights exist (HRP). Three phases:
//!
//! 1. Continuous relaxation: with `y_a = x_a · price_a / budget`, minimize
//!    `Σ (w_a − y_a)²` subject to `y ≥ 0` and `Σ y ≤ 1`.
//! 2. Floor the continuous share counts. Spend can only go down.
//! 3. Top up one share at a time: the most under-weight asset that is still
//!    affordable gets the next share, until nothing fits or the iteration
//!    cap is reached.
//!
//! A relaxation that does not converge is not an error. The allocator logs a
//! warning and continues from the best available iterate, or from the naive
//! proportional floor when the solver produced nothing usable.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::allocator::{
    prepare, verify_budget_invariant, AllocationError, DiscreteAllocator, Prepared,
    DEFAULT_BUDGET_TOLERANCE,
};
use crate::solver::{solve_qp, Inequalities, RelaxationStatus};
use crate::types::{Allocation, PriceMap, WeightMap};

/// Slack when flooring continuous counts, so 2.9999999 floors to 3.
const FLOOR_TOLERANCE: f64 = 1e-6;

/// Order among assets that are equally under-weight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Cheaper asset first, then ticker order.
    #[default]
    PriceThenAsset,
    /// Ticker order only.
    Asset,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::PriceThenAsset => "price_then_asset",
            TieBreak::Asset => "asset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price_then_asset" | "price" => Some(TieBreak::PriceThenAsset),
            "asset" | "ticker" => Some(TieBreak::Asset),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GreedySettings {
    /// Cap on top-up purchases.
    pub max_iterations: usize,
    pub tie_break: TieBreak,
    /// Iteration cap for the continuous relaxation.
    pub solver_max_iter: u32,
    pub budget_tolerance: f64,
}

impl Default for GreedySettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tie_break: TieBreak::default(),
            solver_max_iter: 200,
            budget_tolerance: DEFAULT_BUDGET_TOLERANCE,
        }
    }
}

/// One top-up purchase.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GreedyStep {
    pub asset: String,
    pub price: f64,
    /// target − actual weight when the asset was picked.
    pub shortfall: f64,
    pub remaining_before: f64,
    pub remaining_after: f64,
}

/// Full trace of one greedy allocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefinementReport {
    pub allocation: Allocation,
    pub relaxation: RelaxationStatus,
    /// False when phase 1 did not reach a clean optimum.
    pub converged: bool,
    /// Counts after flooring and budget repair, before top-up.
    pub floored: BTreeMap<String, u64>,
    /// Shares removed to bring the floored counts within budget.
    pub repaired_shares: u64,
    pub steps: Vec<GreedyStep>,
    /// True when the loop stopped on the iteration cap rather than running out of cash.
    pub iteration_cap_hit: bool,
}

#[derive(Clone, Debug, Default)]
pub struct GreedyAllocator {
    settings: GreedySettings,
}

impl GreedyAllocator {
    pub fn new(settings: GreedySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GreedySettings {
        &self.settings
    }

    /// Allocate and keep every intermediate decision.
    pub fn allocate_with_report(
        &self,
        weights: &WeightMap,
        prices: &PriceMap,
        budget: f64,
    ) -> Result<RefinementReport, AllocationError> {
        let prepared = prepare(weights, prices, budget)?;

        if prepared.slots.is_empty() {
            return Ok(RefinementReport {
                allocation: Allocation::empty(budget),
                relaxation: RelaxationStatus::Skipped,
                converged: true,
                floored: BTreeMap::new(),
                repaired_shares: 0,
                steps: Vec::new(),
                iteration_cap_hit: false,
            });
        }

        // Phase 1
        let (continuous, relaxation, converged) = self.relax(&prepared);

        // Phase 2
        let mut counts: Vec<u64> = continuous
            .iter()
            .map(|x| (x + FLOOR_TOLERANCE).floor().max(0.0) as u64)
            .collect();
        let repaired_shares = prepared.repair_to_budget(&mut counts);
        let floored = prepared.to_allocation(&counts).shares;

        // Phase 3
        let (steps, iteration_cap_hit) = self.top_up(&prepared, &mut counts);

        let allocation = prepared.to_allocation(&counts);
        verify_budget_invariant(
            self.name(),
            &allocation,
            prices,
            budget,
            self.settings.budget_tolerance,
        );

        debug!(
            converged,
            repaired_shares,
            top_ups = steps.len(),
            positions = allocation.position_count(),
            leftover = allocation.leftover,
            "greedy allocation complete"
        );

        Ok(RefinementReport {
            allocation,
            relaxation,
            converged,
            floored,
            repaired_shares,
            steps,
            iteration_cap_hit,
        })
    }

    /// Continuous share counts, relaxation status and convergence flag.
    fn relax(&self, prepared: &Prepared) -> (Vec<f64>, RelaxationStatus, bool) {
        let n = prepared.slots.len();
        let b = prepared.budget;
        let naive: Vec<f64> = prepared
            .slots
            .iter()
            .map(|s| (s.weight * b / s.price).floor())
            .collect();

        let p_diag = vec![2.0; n];
        let q: Vec<f64> = prepared.slots.iter().map(|s| -2.0 * s.weight).collect();
        let mut g = Inequalities::default();
        g.push(vec![1.0; n], 1.0);
        for i in 0..n {
            let mut row = vec![0.0; n];
            row[i] = -1.0;
            g.push(row, 0.0);
        }

        let relaxed = match solve_qp(&p_diag, &q, &g, self.settings.solver_max_iter) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "relaxation unavailable; continuing from naive floor");
                return (naive, RelaxationStatus::Failed(e.to_string()), false);
            }
        };

        let to_counts = |y: &[f64]| -> Vec<f64> {
            y.iter()
                .zip(&prepared.slots)
                .map(|(yi, s)| yi.max(0.0) * b / s.price)
                .collect()
        };

        if !relaxed.status.usable() {
            warn!(
                status = ?relaxed.status,
                "relaxation did not converge; continuing from naive floor"
            );
            return (naive, relaxed.status, false);
        }
        let converged = relaxed.status == RelaxationStatus::Solved;
        if !converged {
            warn!("relaxation reached reduced accuracy only; continuing from its iterate");
        }
        (to_counts(&relaxed.x), relaxed.status, converged)
    }

    fn top_up(&self, prepared: &Prepared, counts: &mut [u64]) -> (Vec<GreedyStep>, bool) {
        let mut steps = Vec::new();

        for _ in 0..self.settings.max_iterations {
            let remaining = prepared.budget - prepared.spend(counts);

            let mut ranked: Vec<(usize, f64)> = (0..counts.len())
                .map(|i| {
                    let shortfall =
                        prepared.slots[i].weight - prepared.actual_weight(i, counts[i]);
                    (i, shortfall)
                })
                .collect();
            ranked.sort_by(|(ia, sa), (ib, sb)| {
                sb.partial_cmp(sa)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| self.tie_order(prepared, *ia, *ib))
            });

            let pick = ranked
                .into_iter()
                .find(|(i, _)| prepared.slots[*i].price <= remaining);
            let Some((i, shortfall)) = pick else {
                return (steps, false);
            };

            counts[i] += 1;
            let slot = &prepared.slots[i];
            steps.push(GreedyStep {
                asset: slot.asset.clone(),
                price: slot.price,
                shortfall,
                remaining_before: remaining,
                remaining_after: prepared.budget - prepared.spend(counts),
            });
        }

        let cap_hit = prepared
            .slots
            .iter()
            .any(|s| s.price <= prepared.budget - prepared.spend(counts));
        if cap_hit {
            warn!(
                max_iterations = self.settings.max_iterations,
                "top-up stopped at iteration cap with affordable assets left"
            );
        }
        (steps, cap_hit)
    }

    fn tie_order(&self, prepared: &Prepared, a: usize, b: usize) -> Ordering {
        let (sa, sb) = (&prepared.slots[a], &prepared.slots[b]);
        match self.settings.tie_break {
            TieBreak::PriceThenAsset => sa
                .price
                .partial_cmp(&sb.price)
                .unwrap_or(Ordering::Equal)
                .then_with(|| sa.asset.cmp(&sb.asset)),
            TieBreak::Asset => sa.asset.cmp(&sb.asset),
        }
    }
}

impl DiscreteAllocator for GreedyAllocator {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn allocate(
        &self,
        weights: &WeightMap,
        prices: &PriceMap,
        budget: f64,
    ) -> Result<Allocation, AllocationError> {
        self.allocate_with_report(weights, prices, budget)
            .map(|r| r.allocation)
    }
}
