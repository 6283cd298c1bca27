//! Weighted recommendation score across strategies.
//!
//! Each component is min–max normalized to 0–100 across the compared rows
//! (50 for every row when all values are equal). Volatility is scored in
//! reverse (lower is better) and reported, but carries no weight in the total.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::compare::ComparisonRow;
use crate::types::StrategyKind;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationWeights {
    pub sharpe: f64,
    pub expected_return: f64,
    pub diversification: f64,
    pub capital_utilization: f64,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.4,
            expected_return: 0.3,
            diversification: 0.2,
            capital_utilization: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreCard {
    pub strategy: StrategyKind,
    pub total: f64,
    pub sharpe_score: f64,
    pub return_score: f64,
    pub volatility_score: f64,
    pub diversification_score: f64,
    pub capital_score: f64,
    /// Raw Sharpe, kept for tie-breaks and display.
    pub sharpe: f64,
}

struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            min = min.min(v);
            max = max.max(v);
        }
        Self { min, max }
    }

    fn score(&self, value: f64, reverse: bool) -> f64 {
        if self.max == self.min {
            return 50.0;
        }
        let span = self.max - self.min;
        if reverse {
            (self.max - value) / span * 100.0
        } else {
            (value - self.min) / span * 100.0
        }
    }
}

/// Score and rank rows, best first.
///
/// Ties on total: higher Sharpe, then strategy id.
pub fn recommend(rows: &[ComparisonRow], weights: &RecommendationWeights) -> Vec<ScoreCard> {
    if rows.is_empty() {
        return Vec::new();
    }

    let sharpe = Range::of(rows.iter().map(|r| r.sharpe));
    let ret = Range::of(rows.iter().map(|r| r.expected_return_pct));
    let vol = Range::of(rows.iter().map(|r| r.volatility_pct));
    let div = Range::of(rows.iter().map(|r| r.diversification_index));
    let cap = Range::of(rows.iter().map(|r| r.capital_utilization_pct));

    let mut cards: Vec<ScoreCard> = rows
        .iter()
        .map(|r| {
            let sharpe_score = sharpe.score(r.sharpe, false);
            let return_score = ret.score(r.expected_return_pct, false);
            let diversification_score = div.score(r.diversification_index, false);
            let capital_score = cap.score(r.capital_utilization_pct, false);
            ScoreCard {
                strategy: r.strategy,
                total: sharpe_score * weights.sharpe
                    + return_score * weights.expected_return
                    + diversification_score * weights.diversification
                    + capital_score * weights.capital_utilization,
                sharpe_score,
                return_score,
                volatility_score: vol.score(r.volatility_pct, true),
                diversification_score,
                capital_score,
                sharpe: r.sharpe,
            }
        })
        .collect();

    cards.sort_by(rank_order);
    cards
}

fn partial_cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn rank_order(a: &ScoreCard, b: &ScoreCard) -> Ordering {
    // 1. Higher total
    partial_cmp_f64(b.total, a.total)
        // 2. Higher Sharpe
        .then_with(|| partial_cmp_f64(b.sharpe, a.sharpe))
        // 3. Strategy id
        .then_with(|| a.strategy.id().cmp(b.strategy.id()))
}
