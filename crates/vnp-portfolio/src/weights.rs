//! vnp-portfolio: weight hygiene
//!
//! Optimizer output is rarely tidy: tiny residual weights and sums of 0.99998.
//! These helpers clean a weight vector before it reaches an allocator.
//!
//! The allocators themselves never renormalize; `prepare_weights` is the only
//! place a weight vector is rescaled, and it reports when it does so.

use crate::types::WeightMap;

// ─── WeightError ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum WeightError {
    /// No weights at all.
    Empty,
    /// A weight is NaN, infinite or negative.
    Invalid { asset: String, weight: f64 },
    /// Σw is zero, so there is nothing to rescale.
    ZeroSum,
    /// Σw is outside `1 ± tolerance`.
    SumOutOfTolerance { sum: f64, tolerance: f64 },
}

impl std::fmt::Display for WeightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "weight vector is empty"),
            Self::Invalid { asset, weight } => {
                write!(f, "invalid weight {weight} for '{asset}'")
            }
            Self::ZeroSum => write!(f, "weights sum to zero"),
            Self::SumOutOfTolerance { sum, tolerance } => {
                write!(f, "weights sum to {sum:.6}, outside 1 ± {tolerance}")
            }
        }
    }
}

impl std::error::Error for WeightError {}

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct WeightPolicy {
    /// |w| below this becomes 0.
    pub clean_cutoff: f64,
    /// Decimal places kept after cleaning.
    pub decimals: u32,
    /// Allowed |Σw − 1| before renormalizing.
    pub sum_tolerance: f64,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            clean_cutoff: 1e-4,
            decimals: 5,
            sum_tolerance: 1e-4,
        }
    }
}

/// Cleaned weights plus what was done to them.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedWeights {
    pub weights: WeightMap,
    /// Tickers zeroed by the cutoff.
    pub dropped: Vec<String>,
    /// Σw before any rescaling.
    pub raw_sum: f64,
    pub renormalized: bool,
}

// ─── Functions ───────────────────────────────────────────────────────────────

/// Zero weights with |w| < `cutoff` and round the rest to `decimals` places.
///
/// Zeroed tickers stay in the map so callers can still see them.
pub fn clean_weights(weights: &WeightMap, cutoff: f64, decimals: u32) -> WeightMap {
    let scale = 10f64.powi(decimals as i32);
    weights
        .iter()
        .map(|(a, w)| {
            let cleaned = if w.abs() < cutoff {
                0.0
            } else {
                (w * scale).round() / scale
            };
            // avoid -0.0 leaking into output
            (a.clone(), cleaned + 0.0)
        })
        .collect()
}

/// Rescale so Σw = 1.
pub fn normalize_weights(weights: &WeightMap) -> Result<WeightMap, WeightError> {
    validate(weights)?;
    let sum: f64 = weights.values().sum();
    if sum <= 0.0 {
        return Err(WeightError::ZeroSum);
    }
    Ok(weights.iter().map(|(a, w)| (a.clone(), w / sum)).collect())
}

/// Ok when |Σw − 1| ≤ `tolerance`.
pub fn check_weight_sum(weights: &WeightMap, tolerance: f64) -> Result<f64, WeightError> {
    validate(weights)?;
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > tolerance {
        return Err(WeightError::SumOutOfTolerance { sum, tolerance });
    }
    Ok(sum)
}

/// Clean, then renormalize only when the cleaned sum drifts past tolerance.
pub fn prepare_weights(
    weights: &WeightMap,
    policy: &WeightPolicy,
) -> Result<PreparedWeights, WeightError> {
    validate(weights)?;

    let cleaned = clean_weights(weights, policy.clean_cutoff, policy.decimals);
    let dropped: Vec<String> = weights
        .iter()
        .filter(|(a, w)| **w != 0.0 && cleaned.get(*a).copied() == Some(0.0))
        .map(|(a, _)| a.clone())
        .collect();

    let raw_sum: f64 = cleaned.values().sum();
    if raw_sum <= 0.0 {
        return Err(WeightError::ZeroSum);
    }

    let (weights, renormalized) = match check_weight_sum(&cleaned, policy.sum_tolerance) {
        Ok(_) => (cleaned, false),
        Err(_) => (normalize_weights(&cleaned)?, true),
    };

    Ok(PreparedWeights {
        weights,
        dropped,
        raw_sum,
        renormalized,
    })
}

fn validate(weights: &WeightMap) -> Result<(), WeightError> {
    if weights.is_empty() {
        return Err(WeightError::Empty);
    }
    for (asset, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(WeightError::Invalid {
                asset: asset.clone(),
                weight,
            });
        }
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
