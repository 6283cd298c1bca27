//! Budgeted integer allocator.
//!
//! Exact discrete allocation by best-bound branch-and-bound. With target value
//! `t_a = w_a · B` the objective is
//!
//! ```text
//! Σ |t_a − p_a x_a| + (B − Σ p_a x_a)  =  B + Σ t_a − 2 Σ min(t_a, p_a x_a)
//! ```
//!
//! so minimizing tracking deviation plus unspent cash is the same as
//! maximizing the target value covered by whole shares within the budget.
//!
//! Covered value is concave in the share count: each share up to
//! `floor(t_a / p_a)` covers its full price, the next one covers only the
//! remainder `r_a`, later ones nothing. A node relaxes coverage to its concave
//! envelope over the node's integer bounds. That makes the relaxation a
//! continuous knapsack, solved exactly in ratio order: whole-share segments
//! first (ratio 1), then remainder shares by `r_a / p_a`. At most one count is
//! fractional. Because a remainder share is charged its full price, the bound
//! stays close to the integer optimum even for 30 names at VND scale.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::allocator::{
    prepare, verify_budget_invariant, AllocationError, DiscreteAllocator, Prepared,
    DEFAULT_BUDGET_TOLERANCE,
};
use crate::types::{Allocation, PriceMap, WeightMap};

/// Float slack on budget comparisons, as a fraction of the budget.
const BUDGET_EPS: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub struct IntegerSettings {
    /// Relaxations solved before settling for the incumbent.
    pub max_nodes: usize,
    /// |x − round(x)| below this counts as integral.
    pub integrality_tolerance: f64,
    /// Stop once the incumbent objective is within this many currency units
    /// of the best open bound. 0 searches to optimality.
    pub absolute_gap: f64,
    pub budget_tolerance: f64,
}

impl Default for IntegerSettings {
    fn default() -> Self {
        Self {
            max_nodes: 20_000,
            integrality_tolerance: 1e-4,
            absolute_gap: 0.0,
            budget_tolerance: DEFAULT_BUDGET_TOLERANCE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IntegerAllocator {
    settings: IntegerSettings,
}

/// Search statistics, logged after each allocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchStats {
    /// Relaxations solved.
    pub nodes: usize,
    pub pruned: usize,
    pub incumbent_updates: usize,
    /// True when the node cap stopped the search before the gap closed.
    pub truncated: bool,
    /// Objective of the returned allocation, in currency units.
    pub objective: f64,
    /// Proven lower bound on the objective, in currency units.
    pub lower_bound: f64,
}

impl SearchStats {
    /// objective − lower bound; 0 means proven optimal.
    pub fn gap(&self) -> f64 {
        (self.objective - self.lower_bound).max(0.0)
    }
}

impl IntegerAllocator {
    pub fn new(settings: IntegerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IntegerSettings {
        &self.settings
    }

    /// Same as [`DiscreteAllocator::allocate`], also returning search stats.
    pub fn allocate_with_stats(
        &self,
        weights: &WeightMap,
        prices: &PriceMap,
        budget: f64,
    ) -> Result<(Allocation, SearchStats), AllocationError> {
        let prepared = prepare(weights, prices, budget)?;

        if prepared.slots.is_empty() {
            return Ok((Allocation::empty(budget), SearchStats::default()));
        }
        if let Some(cheapest) = prepared.cheapest_price() {
            if cheapest > prepared.budget {
                return Err(AllocationError::InfeasibleAllocation {
                    budget,
                    cheapest_price: cheapest,
                });
            }
        }

        let (counts, stats) = self.search(&prepared);
        let allocation = prepared.to_allocation(&counts);
        verify_budget_invariant(
            self.name(),
            &allocation,
            prices,
            budget,
            self.settings.budget_tolerance,
        );

        debug!(
            nodes = stats.nodes,
            pruned = stats.pruned,
            updates = stats.incumbent_updates,
            gap = stats.gap(),
            positions = allocation.position_count(),
            leftover = allocation.leftover,
            "integer allocation complete"
        );
        Ok((allocation, stats))
    }

    fn search(&self, prepared: &Prepared) -> (Vec<u64>, SearchStats) {
        let b = prepared.budget;
        let eps = BUDGET_EPS * b;
        let gap = self.settings.absolute_gap.max(eps);

        let mut search = Search::new(prepared, self.settings.integrality_tolerance);
        let root = Node {
            lower: vec![0; prepared.slots.len()],
            upper: prepared
                .slots
                .iter()
                .map(|s| (b / s.price).floor() as u64)
                .collect(),
        };
        search.push(root, 0);

        let mut lower_bound = None;
        while let Some(open) = search.open.pop() {
            if open.bound >= search.best - gap {
                // Best-first: every other open node is at least as bad.
                search.stats.pruned += 1 + search.open.len();
                search.open.clear();
                lower_bound = Some(open.bound);
                break;
            }
            if search.stats.nodes + 2 > self.settings.max_nodes {
                search.stats.truncated = true;
                lower_bound = Some(open.bound);
                warn!(
                    max_nodes = self.settings.max_nodes,
                    objective = search.best,
                    bound = open.bound,
                    "node limit reached; returning best allocation found"
                );
                break;
            }

            let Open { node, x, depth, .. } = open;
            let Some(i) = most_fractional(&x, self.settings.integrality_tolerance) else {
                continue;
            };
            let v = x[i];
            let mut down = node.clone();
            down.upper[i] = v.floor() as u64;
            let mut up = node;
            up.lower[i] = v.ceil() as u64;
            for child in [down, up] {
                if child.is_consistent() {
                    search.push(child, depth + 1);
                }
            }
        }

        let mut stats = search.stats;
        stats.objective = search.best;
        stats.lower_bound = lower_bound.unwrap_or(search.best).min(search.best);
        (search.incumbent, stats)
    }
}

impl DiscreteAllocator for IntegerAllocator {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn allocate(
        &self,
        weights: &WeightMap,
        prices: &PriceMap,
        budget: f64,
    ) -> Result<Allocation, AllocationError> {
        self.allocate_with_stats(weights, prices, budget)
            .map(|(allocation, _)| allocation)
    }
}

// ─── Coverage ────────────────────────────────────────────────────────────────

/// Target value one asset can cover with whole shares.
#[derive(Clone, Debug, PartialEq)]
struct Coverage {
    target: f64,
    /// floor(target / price)
    whole: u64,
    /// target − whole × price; 0 when the target is a whole number of shares.
    remainder: f64,
}

impl Coverage {
    fn new(target: f64, price: f64) -> Self {
        let whole = (target / price).floor().max(0.0);
        let mut remainder = (target - whole * price).max(0.0);
        if remainder <= BUDGET_EPS * price {
            remainder = 0.0;
        }
        Self {
            target,
            whole: whole as u64,
            remainder,
        }
    }

    fn covered(&self, count: u64, price: f64) -> f64 {
        self.target.min(price * count as f64)
    }

    /// Coverage added by the share after `count`.
    fn marginal(&self, count: u64, price: f64) -> f64 {
        match count.cmp(&self.whole) {
            Ordering::Less => price,
            Ordering::Equal => self.remainder,
            Ordering::Greater => 0.0,
        }
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Node {
    lower: Vec<u64>,
    upper: Vec<u64>,
}

impl Node {
    fn is_consistent(&self) -> bool {
        self.lower.iter().zip(&self.upper).all(|(lo, hi)| lo <= hi)
    }
}

/// A relaxed node waiting to be branched.
struct Open {
    bound: f64,
    depth: usize,
    seq: usize,
    node: Node,
    x: Vec<f64>,
}

// Max-heap order: lowest bound first, then deepest, then oldest.
impl Ord for Open {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Open {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Open {}

struct Relaxed {
    x: Vec<f64>,
    bound: f64,
}

// ─── Search state ────────────────────────────────────────────────────────────

struct Search<'a> {
    prepared: &'a Prepared,
    cover: Vec<Coverage>,
    tolerance: f64,
    eps: f64,
    open: BinaryHeap<Open>,
    seq: usize,
    incumbent: Vec<u64>,
    best: f64,
    stats: SearchStats,
}

impl<'a> Search<'a> {
    /// Seeds the incumbent with the floored proportional allocation.
    fn new(prepared: &'a Prepared, tolerance: f64) -> Self {
        let cover: Vec<Coverage> = prepared
            .slots
            .iter()
            .map(|s| Coverage::new(s.weight * prepared.budget, s.price))
            .collect();

        let mut incumbent: Vec<u64> = cover.iter().map(|c| c.whole).collect();
        prepared.repair_to_budget(&mut incumbent);
        fill_greedily(prepared, &cover, &mut incumbent);
        let best = prepared.tracking_objective(&incumbent);

        Self {
            prepared,
            cover,
            tolerance,
            eps: BUDGET_EPS * prepared.budget,
            open: BinaryHeap::new(),
            seq: 0,
            incumbent,
            best,
            stats: SearchStats::default(),
        }
    }

    /// Relax `node`, round its solution into a candidate and queue it.
    fn push(&mut self, node: Node, depth: usize) {
        self.stats.nodes += 1;
        let Some(relaxed) = relax(self.prepared, &self.cover, &node) else {
            self.stats.pruned += 1;
            return;
        };

        let mut rounded: Vec<u64> = relaxed
            .x
            .iter()
            .map(|v| (v + self.tolerance).floor().max(0.0) as u64)
            .collect();
        self.prepared.repair_to_budget(&mut rounded);
        fill_greedily(self.prepared, &self.cover, &mut rounded);
        let objective = self.prepared.tracking_objective(&rounded);
        if objective < self.best - self.eps {
            self.best = objective;
            self.incumbent = rounded;
            self.stats.incumbent_updates += 1;
        }

        self.open.push(Open {
            bound: relaxed.bound,
            depth,
            seq: self.seq,
            node,
            x: relaxed.x,
        });
        self.seq += 1;
    }
}

/// Continuous knapsack over the coverage envelope within the node's bounds.
/// `None` when the node's lower bounds alone overspend the budget.
fn relax(prepared: &Prepared, cover: &[Coverage], node: &Node) -> Option<Relaxed> {
    let b = prepared.budget;
    let eps = BUDGET_EPS * b;
    let slots = &prepared.slots;

    let mut x: Vec<f64> = node.lower.iter().map(|&lo| lo as f64).collect();
    let mut spent = 0.0;
    let mut covered = 0.0;
    for (i, slot) in slots.iter().enumerate() {
        spent += slot.price * node.lower[i] as f64;
        covered += cover[i].covered(node.lower[i], slot.price);
    }
    if spent > b + eps {
        return None;
    }
    let mut capacity = b - spent;

    let mut whole = Vec::new();
    let mut partial = Vec::new();
    for (i, c) in cover.iter().enumerate() {
        let (lo, hi) = (node.lower[i], node.upper[i]);
        if lo > c.whole {
            continue;
        }
        if hi.min(c.whole) > lo {
            whole.push(i);
        }
        if hi > c.whole && c.remainder > 0.0 {
            partial.push(i);
        }
    }
    // Cheapest whole segment last, so it absorbs any shortfall.
    whole.sort_by(|&a, &z| {
        slots[z]
            .price
            .total_cmp(&slots[a].price)
            .then(a.cmp(&z))
    });
    partial.sort_by(|&a, &z| {
        let ra = cover[a].remainder / slots[a].price;
        let rz = cover[z].remainder / slots[z].price;
        rz.total_cmp(&ra)
            .then(slots[a].price.total_cmp(&slots[z].price))
            .then(a.cmp(&z))
    });

    for &i in &whole {
        if capacity <= 0.0 {
            break;
        }
        let price = slots[i].price;
        let len = (node.upper[i].min(cover[i].whole) - node.lower[i]) as f64;
        let cost = len * price;
        if cost <= capacity + eps {
            x[i] += len;
            covered += cost;
            capacity = (capacity - cost).max(0.0);
        } else {
            x[i] += capacity / price;
            covered += capacity;
            capacity = 0.0;
        }
    }
    for &i in &partial {
        if capacity <= 0.0 {
            break;
        }
        let price = slots[i].price;
        if price <= capacity + eps {
            x[i] += 1.0;
            covered += cover[i].remainder;
            capacity = (capacity - price).max(0.0);
        } else {
            let frac = capacity / price;
            x[i] += frac;
            covered += frac * cover[i].remainder;
            capacity = 0.0;
        }
    }

    let target: f64 = cover.iter().map(|c| c.target).sum();
    Some(Relaxed {
        x,
        bound: b + target - 2.0 * covered,
    })
}

/// Buy single shares while one still adds coverage: largest gain first, then
/// lower price, then ticker order.
fn fill_greedily(prepared: &Prepared, cover: &[Coverage], counts: &mut [u64]) {
    let mut remaining = prepared.budget - prepared.spend(counts);
    loop {
        let mut pick: Option<(usize, f64)> = None;
        for (i, slot) in prepared.slots.iter().enumerate() {
            if slot.price > remaining {
                continue;
            }
            let gain = cover[i].marginal(counts[i], slot.price);
            if gain <= 0.0 {
                continue;
            }
            let better = match pick {
                None => true,
                Some((j, g)) => gain > g || (gain == g && slot.price < prepared.slots[j].price),
            };
            if better {
                pick = Some((i, gain));
            }
        }
        let Some((i, _)) = pick else {
            return;
        };
        counts[i] += 1;
        remaining -= prepared.slots[i].price;
    }
}

/// Index of the variable furthest from an integer, lowest index on ties.
fn most_fractional(x: &[f64], tolerance: f64) -> Option<usize> {
    let mut pick: Option<(usize, f64)> = None;
    for (i, v) in x.iter().enumerate() {
        let frac = v - v.floor();
        let dist = frac.min(1.0 - frac);
        if dist <= tolerance {
            continue;
        }
        if pick.map_or(true, |(_, d)| dist > d) {
            pick = Some((i, dist));
        }
    }
    pick.map(|(i, _)| i)
}
