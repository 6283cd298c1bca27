//! Typed view over the merged config tree.
//!
//! Every field has a default, so `{}` deserializes to the stock settings.
//! Enum-like values (`tie_break`, `allocator_overrides`) stay strings here and
//! are parsed by the command that maps them onto library settings.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub allocation: AllocationSection,
    pub weights: WeightsSection,
    pub backtest: BacktestSection,
    pub recommendation: RecommendationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSection {
    /// Currency units.
    pub budget_tolerance: f64,
    pub integer: IntegerSection,
    pub greedy: GreedySection,
    /// strategy id -> allocator name
    pub allocator_overrides: BTreeMap<String, String>,
}

impl Default for AllocationSection {
    fn default() -> Self {
        Self {
            budget_tolerance: 1.0,
            integer: IntegerSection::default(),
            greedy: GreedySection::default(),
            allocator_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegerSection {
    pub max_nodes: usize,
    pub integrality_tolerance: f64,
    /// Currency slack at which the search stops proving optimality.
    pub absolute_gap: f64,
}

impl Default for IntegerSection {
    fn default() -> Self {
        Self {
            max_nodes: 20_000,
            integrality_tolerance: 1e-4,
            absolute_gap: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedySection {
    pub max_iterations: usize,
    pub tie_break: String,
}

impl Default for GreedySection {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tie_break: "price_then_asset".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub clean_cutoff: f64,
    pub sum_tolerance: f64,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            clean_cutoff: 1e-4,
            sum_tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub trading_days_per_year: f64,
    pub benchmarks: Vec<String>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            trading_days_per_year: 252.0,
            benchmarks: ["VNINDEX", "VN30", "HNX30", "HNXINDEX"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSection {
    pub sharpe: f64,
    pub expected_return: f64,
    pub diversification: f64,
    pub capital_utilization: f64,
}

impl Default for RecommendationSection {
    fn default() -> Self {
        Self {
            sharpe: 0.4,
            expected_return: 0.3,
            diversification: 0.2,
            capital_utilization: 0.1,
        }
    }
}

impl Settings {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let settings: Settings = serde_json::from_value(config_json.clone())
            .context("config does not match the settings schema")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Numeric range checks. String values are checked where they are parsed.
    pub fn validate(&self) -> Result<()> {
        let a = &self.allocation;
        if !(a.budget_tolerance.is_finite() && a.budget_tolerance >= 0.0) {
            bail!(
                "allocation.budget_tolerance must be finite and >= 0, got {}",
                a.budget_tolerance
            );
        }
        if a.integer.max_nodes == 0 {
            bail!("allocation.integer.max_nodes must be > 0");
        }
        let tol = a.integer.integrality_tolerance;
        if !(tol > 0.0 && tol < 0.5) {
            bail!("allocation.integer.integrality_tolerance must be in (0, 0.5), got {tol}");
        }
        let gap = a.integer.absolute_gap;
        if !(gap.is_finite() && gap >= 0.0) {
            bail!("allocation.integer.absolute_gap must be finite and >= 0, got {gap}");
        }

        let w = &self.weights;
        if !(w.clean_cutoff.is_finite() && w.clean_cutoff >= 0.0) {
            bail!("weights.clean_cutoff must be finite and >= 0, got {}", w.clean_cutoff);
        }
        if !(w.sum_tolerance.is_finite() && w.sum_tolerance >= 0.0) {
            bail!("weights.sum_tolerance must be finite and >= 0, got {}", w.sum_tolerance);
        }

        let tdpy = self.backtest.trading_days_per_year;
        if !(tdpy.is_finite() && tdpy > 0.0) {
            bail!("backtest.trading_days_per_year must be > 0, got {tdpy}");
        }

        let r = &self.recommendation;
        let parts = [
            ("sharpe", r.sharpe),
            ("expected_return", r.expected_return),
            ("diversification", r.diversification),
            ("capital_utilization", r.capital_utilization),
        ];
        for (name, v) in parts {
            if !(v.is_finite() && v >= 0.0) {
                bail!("recommendation.{name} must be finite and >= 0, got {v}");
            }
        }
        if parts.iter().map(|(_, v)| v).sum::<f64>() <= 0.0 {
            bail!("recommendation weights must not all be zero");
        }
        Ok(())
    }
}
