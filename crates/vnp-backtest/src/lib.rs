//! vnp-backtest
//!
//! Historical evaluation of a portfolio:
//! - Wide close-price history (one column per ticker), CSV-backed
//! - Weight backtest: daily returns · target weights, growth of 1
//! - Holdings backtest: discrete share counts + leftover cash, marked daily
//! - Performance metrics (return, volatility, Sharpe, Sortino, drawdown, beta/alpha)
//!
//! Deterministic: same history + same inputs => same curves and metrics.

mod engine;
mod loader;
mod metrics;
mod types;

pub use engine::{backtest_holdings, backtest_weights, HoldingsBacktest, WeightBacktest};
pub use loader::{load_price_history_csv, parse_price_history_csv, LoadError};
pub use metrics::{compute_performance, max_drawdown, sample_std, PerformanceMetrics};
pub use types::{BacktestError, BacktestSettings, PriceHistory};
