//! Price-history CSV loader (deterministic).
//!
//! Wide format, one row per trading day:
//!
//! ```text
//! date,FPT,HPG,VNINDEX
//! 2024-01-02,95200,27450,1129.9
//! 2024-01-03,96100,27600,1136.7
//! ```
//!
//! - `date` is the first column, `YYYY-MM-DD`.
//! - Every other header is a ticker; every cell must hold a positive price.
//! - Rows may come in any order; they are sorted by date. Duplicate dates fail.
//! - Lines starting with `#` are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::types::{BacktestError, PriceHistory};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    EmptyInput,
    MissingHeader(&'static str),
    DuplicateColumn(String),
    ParseDate { line: usize, value: String },
    ParsePrice {
        line: usize,
        column: String,
        value: String,
    },
    Csv(String),
    Io(String),
    Invalid(BacktestError),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e.to_string())
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::MissingHeader(h) => write!(f, "missing header: {}", h),
            LoadError::DuplicateColumn(c) => write!(f, "duplicate column: {}", c),
            LoadError::ParseDate { line, value } => {
                write!(f, "bad date at line {}: {}", line, value)
            }
            LoadError::ParsePrice {
                line,
                column,
                value,
            } => write!(f, "bad price at line {} column {}: {}", line, column, value),
            LoadError::Csv(e) => write!(f, "csv error: {}", e),
            LoadError::Io(e) => write!(f, "io error: {}", e),
            LoadError::Invalid(e) => write!(f, "invalid history: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load a price history from a CSV file on disk.
pub fn load_price_history_csv(path: impl AsRef<Path>) -> Result<PriceHistory, LoadError> {
    let s = fs::read_to_string(path)?;
    parse_price_history_csv(&s)
}

/// Parse a price history from CSV content (pure).
pub fn parse_price_history_csv(input: &str) -> Result<PriceHistory, LoadError> {
    let input = input.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input.as_bytes());

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(LoadError::EmptyInput);
    }
    if !headers
        .get(0)
        .is_some_and(|h| h.eq_ignore_ascii_case("date"))
    {
        return Err(LoadError::MissingHeader("date"));
    }

    let tickers: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if tickers.is_empty() {
        return Err(LoadError::EmptyInput);
    }
    let mut seen = std::collections::BTreeSet::new();
    for t in &tickers {
        if t.is_empty() || !seen.insert(t.as_str()) {
            return Err(LoadError::DuplicateColumn(t.clone()));
        }
    }

    let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);

        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            LoadError::ParseDate {
                line,
                value: raw_date.to_string(),
            }
        })?;

        let mut closes = Vec::with_capacity(tickers.len());
        for (j, ticker) in tickers.iter().enumerate() {
            let raw = record.get(j + 1).unwrap_or_default();
            let px = raw.parse::<f64>().map_err(|_| LoadError::ParsePrice {
                line,
                column: ticker.clone(),
                value: raw.to_string(),
            })?;
            closes.push(px);
        }
        rows.push((date, closes));
    }

    if rows.is_empty() {
        return Err(LoadError::EmptyInput);
    }
    rows.sort_by_key(|(d, _)| *d);

    let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
    let mut series: BTreeMap<String, Vec<f64>> = tickers
        .iter()
        .map(|t| (t.clone(), Vec::with_capacity(rows.len())))
        .collect();
    for (_, closes) in &rows {
        for (t, px) in tickers.iter().zip(closes) {
            if let Some(s) = series.get_mut(t) {
                s.push(*px);
            }
        }
    }

    PriceHistory::new(dates, series).map_err(LoadError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_rows() {
        let csv = "\u{feff}date,FPT,VNINDEX\n\
                   2024-01-03,96100,1136.7\n\
                   # holiday note\n\
                   2024-01-02, 95200 ,1129.9\n";
        let h = parse_price_history_csv(csv).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(h.closes("FPT").unwrap(), &[95_200.0, 96_100.0]);
        assert_eq!(h.tickers().collect::<Vec<_>>(), vec!["FPT", "VNINDEX"]);
    }

    #[test]
    fn rejects_missing_date_header() {
        assert_eq!(
            parse_price_history_csv("day,FPT\n2024-01-02,1\n").unwrap_err(),
            LoadError::MissingHeader("date")
        );
    }

    #[test]
    fn rejects_bad_cells() {
        assert!(matches!(
            parse_price_history_csv("date,FPT\n2024-13-02,1\n").unwrap_err(),
            LoadError::ParseDate { .. }
        ));
        assert!(matches!(
            parse_price_history_csv("date,FPT\n2024-01-02,abc\n").unwrap_err(),
            LoadError::ParsePrice { .. }
        ));
        assert!(matches!(
            parse_price_history_csv("date,FPT\n2024-01-02,-5\n").unwrap_err(),
            LoadError::Invalid(BacktestError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_dates_and_columns() {
        assert!(matches!(
            parse_price_history_csv("date,FPT\n2024-01-02,1\n2024-01-02,2\n").unwrap_err(),
            LoadError::Invalid(BacktestError::UnsortedDates { .. })
        ));
        assert_eq!(
            parse_price_history_csv("date,FPT,FPT\n2024-01-02,1,1\n").unwrap_err(),
            LoadError::DuplicateColumn("FPT".to_string())
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(parse_price_history_csv("").unwrap_err(), LoadError::EmptyInput);
        assert_eq!(
            parse_price_history_csv("date,FPT\n").unwrap_err(),
            LoadError::EmptyInput
        );
    }
}
