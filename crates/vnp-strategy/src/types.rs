use std::fmt;

use serde::{Deserialize, Serialize};
use vnp_portfolio::{
    compute_allocation_metrics, Allocation, AllocationError, AllocationMetrics, AllocatorKind,
    BudgetCheck, PriceMap, RefinementReport, WeightError, WeightMap,
};

// ─── StrategyKind ────────────────────────────────────────────────────────────

/// The optimizer strategies whose output gets allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Markowitz,
    MaxSharpe,
    MinVolatility,
    MinCvar,
    MinCdar,
    Hrp,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Markowitz,
        StrategyKind::MaxSharpe,
        StrategyKind::MinVolatility,
        StrategyKind::MinCvar,
        StrategyKind::MinCdar,
        StrategyKind::Hrp,
    ];

    /// Stable id used in config keys and output.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Markowitz => "markowitz",
            StrategyKind::MaxSharpe => "max_sharpe",
            StrategyKind::MinVolatility => "min_volatility",
            StrategyKind::MinCvar => "min_cvar",
            StrategyKind::MinCdar => "min_cdar",
            StrategyKind::Hrp => "hrp",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Markowitz => "Markowitz",
            StrategyKind::MaxSharpe => "Max Sharpe",
            StrategyKind::MinVolatility => "Min Volatility",
            StrategyKind::MinCvar => "Min CVaR",
            StrategyKind::MinCdar => "Min CDaR",
            StrategyKind::Hrp => "HRP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.id() == s)
    }

    /// HRP has no native discrete allocation and takes the greedy path.
    pub fn default_allocator(&self) -> AllocatorKind {
        match self {
            StrategyKind::Hrp => AllocatorKind::Greedy,
            _ => AllocatorKind::Integer,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ─── Optimizer output (input to this crate) ──────────────────────────────────

/// What an external optimizer reports for one strategy. Passed through as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOutput {
    pub strategy: StrategyKind,
    pub weights: WeightMap,
    /// Annualized, as a fraction.
    pub expected_return: f64,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub sharpe: Option<f64>,
    #[serde(default)]
    pub cvar: Option<f64>,
    #[serde(default)]
    pub cdar: Option<f64>,
}

/// Risk figure a strategy optimizes for, plus volatility where known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskProfile {
    Volatility { volatility: f64 },
    Cvar { cvar: f64, volatility: Option<f64> },
    Cdar { cdar: f64, volatility: Option<f64> },
}

impl RiskProfile {
    /// CVaR/CDaR strategies must report their tail metric; the rest must
    /// report volatility.
    pub fn from_output(output: &OptimizerOutput) -> Result<Self, StrategyError> {
        let missing = |metric| StrategyError::MissingMetric {
            strategy: output.strategy,
            metric,
        };
        match output.strategy {
            StrategyKind::MinCvar => Ok(RiskProfile::Cvar {
                cvar: output.cvar.ok_or_else(|| missing("cvar"))?,
                volatility: output.volatility,
            }),
            StrategyKind::MinCdar => Ok(RiskProfile::Cdar {
                cdar: output.cdar.ok_or_else(|| missing("cdar"))?,
                volatility: output.volatility,
            }),
            _ => Ok(RiskProfile::Volatility {
                volatility: output.volatility.ok_or_else(|| missing("volatility"))?,
            }),
        }
    }

    pub fn volatility(&self) -> Option<f64> {
        match self {
            RiskProfile::Volatility { volatility } => Some(*volatility),
            RiskProfile::Cvar { volatility, .. } | RiskProfile::Cdar { volatility, .. } => {
                *volatility
            }
        }
    }

    pub fn cvar(&self) -> Option<f64> {
        match self {
            RiskProfile::Cvar { cvar, .. } => Some(*cvar),
            _ => None,
        }
    }

    pub fn cdar(&self) -> Option<f64> {
        match self {
            RiskProfile::Cdar { cdar, .. } => Some(*cdar),
            _ => None,
        }
    }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// One strategy's complete outcome.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub strategy: StrategyKind,
    pub allocator: AllocatorKind,
    /// Weights as allocated (after hygiene).
    pub weights: WeightMap,
    pub prices: PriceMap,
    pub budget: f64,
    pub expected_return: f64,
    pub risk: RiskProfile,
    pub sharpe: Option<f64>,
    pub allocation: Allocation,
    pub budget_check: BudgetCheck,
    /// Greedy path only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementReport>,
    pub weights_renormalized: bool,
}

/// Fields common to every strategy's result.
pub trait PortfolioResult {
    fn strategy(&self) -> StrategyKind;
    fn weights(&self) -> &WeightMap;
    fn allocation(&self) -> &Allocation;
    fn prices(&self) -> &PriceMap;
    fn budget(&self) -> f64;

    fn leftover(&self) -> f64 {
        self.allocation().leftover
    }

    fn invested(&self) -> f64 {
        self.allocation().total_spent(self.prices())
    }

    /// Invested share of capital, in percent.
    fn capital_utilization(&self) -> f64 {
        let total = self.invested() + self.leftover();
        if total > 0.0 {
            self.invested() / total * 100.0
        } else {
            0.0
        }
    }

    fn allocation_metrics(&self) -> AllocationMetrics {
        compute_allocation_metrics(self.weights(), self.allocation(), self.prices(), self.budget())
    }
}

impl PortfolioResult for OptimizationResult {
    fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    fn weights(&self) -> &WeightMap {
        &self.weights
    }

    fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    fn prices(&self) -> &PriceMap {
        &self.prices
    }

    fn budget(&self) -> f64 {
        self.budget
    }
}

// ─── StrategyError ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum StrategyError {
    Weights {
        strategy: StrategyKind,
        source: WeightError,
    },
    Allocation {
        strategy: StrategyKind,
        source: AllocationError,
    },
    MissingMetric {
        strategy: StrategyKind,
        metric: &'static str,
    },
    PriceSource {
        detail: String,
    },
    InvalidBudget {
        budget: f64,
    },
}

impl StrategyError {
    pub fn strategy(&self) -> Option<StrategyKind> {
        match self {
            Self::Weights { strategy, .. }
            | Self::Allocation { strategy, .. }
            | Self::MissingMetric { strategy, .. } => Some(*strategy),
            Self::PriceSource { .. } | Self::InvalidBudget { .. } => None,
        }
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weights { strategy, source } => write!(f, "{strategy}: weights: {source}"),
            Self::Allocation { strategy, source } => {
                write!(f, "{strategy}: allocation: {source}")
            }
            Self::MissingMetric { strategy, metric } => {
                write!(f, "{strategy}: optimizer output has no {metric}")
            }
            Self::PriceSource { detail } => write!(f, "price source: {detail}"),
            Self::InvalidBudget { budget } => write!(f, "budget must be > 0, got {budget}"),
        }
    }
}

impl std::error::Error for StrategyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Weights { source, .. } => Some(source),
            Self::Allocation { source, .. } => Some(source),
            _ => None,
        }
    }
}
