//! vnp-strategy
//!
//! Per-strategy evaluation around the allocation core:
//! - Six optimizer strategies; weights and risk metrics arrive pre-computed
//! - Runner: weight hygiene -> latest prices -> allocator -> typed result
//! - One strategy failing never blocks the others
//! - Cross-strategy comparison table and weighted recommendation score
//! - No global state: every run carries its own `RunContext`

mod compare;
mod recommend;
mod runner;
mod source;
mod types;

pub use compare::{compare, ComparisonRow, DrawdownSource, VOLATILITY_DRAWDOWN_MULTIPLE};
pub use recommend::{recommend, RecommendationWeights, ScoreCard};
pub use runner::{RunContext, RunSummary, RunnerSettings, StrategyFailure, StrategyRunner};
pub use source::PriceSource;
pub use types::{
    OptimizationResult, OptimizerOutput, PortfolioResult, RiskProfile, StrategyError,
    StrategyKind,
};
