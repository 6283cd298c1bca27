use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vnp_portfolio::{
    prepare_weights, AllocatorKind, AllocatorSettings, Budget, DiscreteAllocator,
    GreedyAllocator, IntegerAllocator, WeightPolicy,
};

use crate::source::PriceSource;
use crate::types::{OptimizationResult, OptimizerOutput, RiskProfile, StrategyError, StrategyKind};

/// Request-scoped context for one evaluation run. Created by the caller and
/// passed down explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub budget: f64,
    /// Hash of the effective config, when one was loaded.
    pub config_hash: Option<String>,
}

impl RunContext {
    pub fn new(budget: f64, config_hash: Option<String>) -> Result<Self, StrategyError> {
        Self::with_run_id(Uuid::new_v4(), budget, config_hash)
    }

    pub fn with_run_id(
        run_id: Uuid,
        budget: f64,
        config_hash: Option<String>,
    ) -> Result<Self, StrategyError> {
        let budget = Budget::new(budget)
            .map_err(|_| StrategyError::InvalidBudget { budget })?
            .amount();
        Ok(Self {
            run_id,
            budget,
            config_hash,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunnerSettings {
    pub allocators: AllocatorSettings,
    pub weights: WeightPolicy,
    /// Takes precedence over `StrategyKind::default_allocator`.
    pub allocator_overrides: BTreeMap<StrategyKind, AllocatorKind>,
}

/// A strategy that could not be allocated, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub error: StrategyError,
}

/// Everything one `run_all` produced, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub results: Vec<OptimizationResult>,
    pub failures: Vec<StrategyFailure>,
}

impl RunSummary {
    pub fn any_succeeded(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn result(&self, strategy: StrategyKind) -> Option<&OptimizationResult> {
        self.results.iter().find(|r| r.strategy == strategy)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StrategyRunner {
    settings: RunnerSettings,
}

impl StrategyRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn allocator_for(&self, strategy: StrategyKind) -> AllocatorKind {
        self.settings
            .allocator_overrides
            .get(&strategy)
            .copied()
            .unwrap_or_else(|| strategy.default_allocator())
    }

    /// Allocate one strategy's optimizer output.
    pub fn run(
        &self,
        ctx: &RunContext,
        output: &OptimizerOutput,
        source: &dyn PriceSource,
    ) -> Result<OptimizationResult, StrategyError> {
        let strategy = output.strategy;
        let risk = RiskProfile::from_output(output)?;

        let prepared = prepare_weights(&output.weights, &self.settings.weights)
            .map_err(|source| StrategyError::Weights { strategy, source })?;
        if prepared.renormalized {
            warn!(
                %strategy,
                raw_sum = prepared.raw_sum,
                dropped = prepared.dropped.len(),
                "weights renormalized before allocation"
            );
        }

        let tickers: Vec<String> = prepared
            .weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(t, _)| t.clone())
            .collect();
        let prices = source.latest_prices(&tickers)?;
        debug!(%strategy, requested = tickers.len(), priced = prices.len(), "prices fetched");

        let allocator = self.allocator_for(strategy);
        let to_err = |source| StrategyError::Allocation { strategy, source };
        let (allocation, refinement) = match allocator {
            AllocatorKind::Integer => {
                let alloc = IntegerAllocator::new(self.settings.allocators.integer.clone())
                    .allocate(&prepared.weights, &prices, ctx.budget)
                    .map_err(to_err)?;
                (alloc, None)
            }
            AllocatorKind::Greedy => {
                let report = GreedyAllocator::new(self.settings.allocators.greedy.clone())
                    .allocate_with_report(&prepared.weights, &prices, ctx.budget)
                    .map_err(to_err)?;
                (report.allocation.clone(), Some(report))
            }
        };

        let budget_check = allocation.check_budget(&prices, ctx.budget);
        info!(
            run_id = %ctx.run_id,
            %strategy,
            allocator = allocator.as_str(),
            positions = allocation.position_count(),
            spent = budget_check.spent,
            leftover = allocation.leftover,
            "strategy allocated"
        );

        Ok(OptimizationResult {
            strategy,
            allocator,
            weights: prepared.weights,
            prices,
            budget: ctx.budget,
            expected_return: output.expected_return,
            risk,
            sharpe: output.sharpe,
            allocation,
            budget_check,
            refinement,
            weights_renormalized: prepared.renormalized,
        })
    }

    /// Allocate every output in order. A failing strategy is recorded and the
    /// rest still run.
    pub fn run_all(
        &self,
        ctx: &RunContext,
        outputs: &[OptimizerOutput],
        source: &dyn PriceSource,
    ) -> RunSummary {
        let mut results = Vec::with_capacity(outputs.len());
        let mut failures = Vec::new();

        for output in outputs {
            match self.run(ctx, output, source) {
                Ok(result) => results.push(result),
                Err(err) => {
                    error!(
                        run_id = %ctx.run_id,
                        strategy = %output.strategy,
                        error = %err,
                        "strategy failed"
                    );
                    failures.push(StrategyFailure {
                        strategy: output.strategy,
                        error: err,
                    });
                }
            }
        }

        info!(
            run_id = %ctx.run_id,
            succeeded = results.len(),
            failed = failures.len(),
            "run complete"
        );
        RunSummary {
            run_id: ctx.run_id,
            results,
            failures,
        }
    }
}
