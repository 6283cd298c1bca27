use vnp_portfolio::PriceMap;

use crate::types::StrategyError;

/// Opaque latest-price provider.
///
/// Tickers the source knows nothing about are simply absent from the
/// returned map; the allocator decides whether that matters.
pub trait PriceSource {
    fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, StrategyError>;
}

/// A fixed snapshot of prices.
impl PriceSource for PriceMap {
    fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, StrategyError> {
        Ok(tickers
            .iter()
            .filter_map(|t| self.get(t).map(|p| (t.clone(), *p)))
            .collect())
    }
}
