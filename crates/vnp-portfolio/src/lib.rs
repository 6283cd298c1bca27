//! vnp-portfolio
//!
//! Discrete allocation core:
//! - Continuous target weights + latest prices + budget -> whole-share counts
//! - Budgeted integer allocator (best-bound branch-and-bound over knapsack relaxations)
//! - Greedy quadratic-refinement allocator (QP relaxation, floor, top-up)
//! - Weight hygiene and allocation metrics
//! - Pure deterministic logic (no IO)

mod solver;
mod types;

pub mod allocator;
pub mod greedy;
pub mod integer;
pub mod metrics;
pub mod weights;

pub use allocator::{
    AllocationError, AllocatorKind, AllocatorSettings, DiscreteAllocator,
    DEFAULT_BUDGET_TOLERANCE,
};
pub use greedy::{GreedyAllocator, GreedySettings, GreedyStep, RefinementReport, TieBreak};
pub use integer::{IntegerAllocator, IntegerSettings, SearchStats};
pub use metrics::{
    compute_allocation_metrics, diversification_index, tracking_deviation, AllocationMetrics,
};
pub use solver::RelaxationStatus;
pub use types::{asset_map, target_errors, Allocation, Budget, BudgetCheck, PriceMap, WeightMap};
pub use weights::{
    check_weight_sum, clean_weights, normalize_weights, prepare_weights, PreparedWeights,
    WeightError, WeightPolicy,
};
