use std::collections::BTreeMap;

use chrono::NaiveDate;
use vnp_portfolio::PriceMap;
use vnp_strategy::{PriceSource, StrategyError};

/// Vietnamese market indices used as benchmarks when present in the history.
pub const DEFAULT_BENCHMARKS: [&str; 4] = ["VNINDEX", "VN30", "HNX30", "HNXINDEX"];

#[derive(Clone, Debug, PartialEq)]
pub struct BacktestSettings {
    /// Annualization factor for returns and volatility.
    pub trading_days_per_year: f64,
    /// Series in the history treated as benchmarks; the first present one
    /// drives beta and alpha.
    pub benchmarks: Vec<String>,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            trading_days_per_year: 252.0,
            benchmarks: DEFAULT_BENCHMARKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ─── BacktestError ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum BacktestError {
    EmptyHistory,
    /// Dates must be strictly increasing.
    UnsortedDates { index: usize, date: NaiveDate },
    LengthMismatch {
        ticker: String,
        expected: usize,
        got: usize,
    },
    InvalidPrice {
        ticker: String,
        date: NaiveDate,
        value: f64,
    },
    /// Fewer than two observations: no return can be computed.
    TooShort { observations: usize },
    /// None of the weighted tickers has history.
    NoUsableTickers,
    /// A held ticker has no history.
    MissingTicker { ticker: String },
}

impl std::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHistory => write!(f, "price history is empty"),
            Self::UnsortedDates { index, date } => {
                write!(f, "dates not strictly increasing at row {index} ({date})")
            }
            Self::LengthMismatch {
                ticker,
                expected,
                got,
            } => write!(f, "series {ticker} has {got} prices, expected {expected}"),
            Self::InvalidPrice {
                ticker,
                date,
                value,
            } => write!(f, "invalid price {value} for {ticker} on {date}"),
            Self::TooShort { observations } => {
                write!(f, "need at least 2 observations, got {observations}")
            }
            Self::NoUsableTickers => write!(f, "no weighted ticker has price history"),
            Self::MissingTicker { ticker } => write!(f, "no price history for held {ticker}"),
        }
    }
}

impl std::error::Error for BacktestError {}

// ─── PriceHistory ────────────────────────────────────────────────────────────

/// Daily closes for a set of tickers on a shared calendar.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceHistory {
    dates: Vec<NaiveDate>,
    series: BTreeMap<String, Vec<f64>>,
}

impl PriceHistory {
    /// Validates: non-empty, strictly increasing dates, every series aligned
    /// to the dates, every price positive and finite.
    pub fn new(
        dates: Vec<NaiveDate>,
        series: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, BacktestError> {
        if dates.is_empty() || series.is_empty() {
            return Err(BacktestError::EmptyHistory);
        }
        for (i, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(BacktestError::UnsortedDates {
                    index: i + 1,
                    date: pair[1],
                });
            }
        }
        for (ticker, closes) in &series {
            if closes.len() != dates.len() {
                return Err(BacktestError::LengthMismatch {
                    ticker: ticker.clone(),
                    expected: dates.len(),
                    got: closes.len(),
                });
            }
            if let Some((i, v)) = closes
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v <= 0.0)
            {
                return Err(BacktestError::InvalidPrice {
                    ticker: ticker.clone(),
                    date: dates[i],
                    value: *v,
                });
            }
        }
        Ok(Self { dates, series })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn closes(&self, ticker: &str) -> Option<&[f64]> {
        self.series.get(ticker).map(Vec::as_slice)
    }

    /// Simple daily returns, one shorter than the close series.
    pub fn returns(&self, ticker: &str) -> Option<Vec<f64>> {
        self.closes(ticker)
            .map(|c| c.windows(2).map(|w| w[1] / w[0] - 1.0).collect())
    }

    /// Last close per ticker.
    pub fn latest_prices(&self) -> PriceMap {
        self.series
            .iter()
            .filter_map(|(t, c)| c.last().map(|p| (t.clone(), *p)))
            .collect()
    }
}

impl PriceSource for PriceHistory {
    fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, StrategyError> {
        Ok(tickers
            .iter()
            .filter_map(|t| {
                self.closes(t)
                    .and_then(|c| c.last())
                    .map(|p| (t.clone(), *p))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(items: &[(&str, &[f64])]) -> BTreeMap<String, Vec<f64>> {
        items
            .iter()
            .map(|(t, v)| (t.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn rejects_unsorted_dates() {
        let err = PriceHistory::new(vec![d(2), d(2)], series(&[("FPT", &[1.0, 2.0])])).unwrap_err();
        assert_eq!(err, BacktestError::UnsortedDates { index: 1, date: d(2) });
    }

    #[test]
    fn rejects_misaligned_and_non_positive_series() {
        assert!(matches!(
            PriceHistory::new(vec![d(1), d(2)], series(&[("FPT", &[1.0])])).unwrap_err(),
            BacktestError::LengthMismatch { .. }
        ));
        assert!(matches!(
            PriceHistory::new(vec![d(1), d(2)], series(&[("FPT", &[1.0, 0.0])])).unwrap_err(),
            BacktestError::InvalidPrice { .. }
        ));
        assert_eq!(
            PriceHistory::new(vec![], BTreeMap::new()).unwrap_err(),
            BacktestError::EmptyHistory
        );
    }

    #[test]
    fn latest_prices_and_returns() {
        let h = PriceHistory::new(
            vec![d(1), d(2), d(3)],
            series(&[("FPT", &[100.0, 110.0, 99.0]), ("VNM", &[50.0, 50.0, 55.0])]),
        )
        .unwrap();
        assert_eq!(h.latest_prices()["FPT"], 99.0);
        let r = h.returns("FPT").unwrap();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);

        let via_source =
            PriceSource::latest_prices(&h, &["VNM".to_string(), "SSI".to_string()]).unwrap();
        assert_eq!(via_source.len(), 1);
        assert_eq!(via_source["VNM"], 55.0);
    }
}
