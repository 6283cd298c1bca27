use serde::Serialize;

/// Performance of one daily return series.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub days: usize,
    /// (growth − 1) × 100
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub annualized_volatility_pct: f64,
    /// mean / std × √N
    pub sharpe: f64,
    /// mean × N / downside std
    pub sortino: f64,
    /// Worst peak-to-trough, as a fraction ≤ 0.
    pub max_drawdown: f64,
    /// Against the first available benchmark.
    pub beta: Option<f64>,
    pub alpha_pct: Option<f64>,
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n − 1). Zero for fewer than two points.
pub fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

fn sample_cov(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Growth-of-1 curve from simple returns.
pub(crate) fn cumulative(returns: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc
        })
        .collect()
}

/// min(curve / running_max − 1). Zero for a monotone or empty curve.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in curve {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min(v / peak - 1.0);
        }
    }
    worst
}

/// Metrics for `returns`; beta/alpha only when `benchmark` is given.
pub fn compute_performance(
    returns: &[f64],
    benchmark: Option<&[f64]>,
    trading_days_per_year: f64,
) -> PerformanceMetrics {
    let days = returns.len();
    let curve = cumulative(returns);
    let growth = curve.last().copied().unwrap_or(1.0);

    let total_return_pct = (growth - 1.0) * 100.0;
    let years = days as f64 / trading_days_per_year;
    let annualized_return_pct = if years > 0.0 && growth > 0.0 {
        (growth.powf(1.0 / years) - 1.0) * 100.0
    } else {
        0.0
    };

    let m = mean(returns);
    let std = sample_std(returns);
    let sharpe = if std > 0.0 {
        m / std * trading_days_per_year.sqrt()
    } else {
        0.0
    };

    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside = sample_std(&negatives) * trading_days_per_year.sqrt();
    let sortino = if downside > 0.0 {
        m * trading_days_per_year / downside
    } else {
        0.0
    };

    let (beta, alpha_pct) = match benchmark {
        Some(bench) if !bench.is_empty() => {
            let n = returns.len().min(bench.len());
            let (p, b) = (&returns[..n], &bench[..n]);
            let var_b = sample_std(b).powi(2);
            let beta = if var_b > 0.0 {
                sample_cov(p, b) / var_b
            } else {
                0.0
            };
            let alpha = (mean(p) - mean(b)) * trading_days_per_year * 100.0;
            (Some(beta), Some(alpha))
        }
        _ => (None, None),
    };

    PerformanceMetrics {
        days,
        total_return_pct,
        annualized_return_pct,
        annualized_volatility_pct: std * trading_days_per_year.sqrt() * 100.0,
        sharpe,
        sortino,
        max_drawdown: max_drawdown(&curve),
        beta,
        alpha_pct,
    }
}
