use serde::Serialize;

use crate::types::{OptimizationResult, PortfolioResult, RiskProfile, StrategyKind};

/// Volatility multiple used when no drawdown measure is available.
pub const VOLATILITY_DRAWDOWN_MULTIPLE: f64 = 2.5;

/// Where a row's `max_drawdown_pct` came from, best first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownSource {
    /// Peak-to-trough of the backtested weight curve.
    Realized,
    Cdar,
    /// −2.5 × volatility.
    VolatilityEstimate,
}

impl DrawdownSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawdownSource::Realized => "realized",
            DrawdownSource::Cdar => "cdar",
            DrawdownSource::VolatilityEstimate => "volatility_estimate",
        }
    }
}

/// One row of the cross-strategy comparison table. Percent fields are × 100.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub strategy: StrategyKind,
    pub expected_return_pct: f64,
    pub volatility_pct: f64,
    pub sharpe: f64,
    /// expected return / volatility, 0 when volatility is 0.
    pub return_risk_ratio: f64,
    pub diversification_index: f64,
    pub capital_utilization_pct: f64,
    pub stock_count: usize,
    pub total_shares: u64,
    pub invested: f64,
    pub leftover: f64,
    pub cvar: Option<f64>,
    pub cdar: Option<f64>,
    /// Worst drawdown as a percent ≤ 0; None when the result carries no risk figure.
    pub max_drawdown_pct: Option<f64>,
    pub drawdown_source: Option<DrawdownSource>,
}

/// Drawdown estimate from the optimizer's risk figures alone.
fn estimated_drawdown(risk: &RiskProfile) -> Option<(f64, DrawdownSource)> {
    if let Some(cdar) = risk.cdar() {
        return Some((-cdar.abs() * 100.0, DrawdownSource::Cdar));
    }
    risk.volatility().map(|v| {
        (
            -VOLATILITY_DRAWDOWN_MULTIPLE * v.abs() * 100.0,
            DrawdownSource::VolatilityEstimate,
        )
    })
}

impl ComparisonRow {
    pub fn from_result(result: &OptimizationResult) -> Self {
        let metrics = result.allocation_metrics();
        let expected_return_pct = result.expected_return * 100.0;
        // Missing volatility compares as zero risk.
        let volatility_pct = result.risk.volatility().unwrap_or(0.0) * 100.0;
        let return_risk_ratio = if volatility_pct > 0.0 {
            expected_return_pct / volatility_pct
        } else {
            0.0
        };
        let drawdown = estimated_drawdown(&result.risk);

        ComparisonRow {
            strategy: result.strategy,
            expected_return_pct,
            volatility_pct,
            sharpe: result.sharpe.unwrap_or(0.0),
            return_risk_ratio,
            diversification_index: metrics.diversification_index,
            capital_utilization_pct: result.capital_utilization(),
            stock_count: metrics.position_count,
            total_shares: metrics.total_shares,
            invested: metrics.total_invested,
            leftover: result.leftover(),
            cvar: result.risk.cvar(),
            cdar: result.risk.cdar(),
            max_drawdown_pct: drawdown.map(|(d, _)| d),
            drawdown_source: drawdown.map(|(_, s)| s),
        }
    }

    /// Replaces the estimate with a backtested drawdown (a fraction ≤ 0).
    pub fn with_realized_drawdown(mut self, max_drawdown: f64) -> Self {
        self.max_drawdown_pct = Some(max_drawdown.min(0.0) * 100.0);
        self.drawdown_source = Some(DrawdownSource::Realized);
        self
    }
}

/// Comparison rows in the order the results were given.
pub fn compare(results: &[OptimizationResult]) -> Vec<ComparisonRow> {
    results.iter().map(ComparisonRow::from_result).collect()
}
