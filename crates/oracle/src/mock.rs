//! Mock price feed for testing
//!
//! Provides configurable fixed prices per market.

use async_trait::async_trait;
use bankerjoe_core::{Exp, MarketId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::OracleError;
use crate::types::{PriceFeed, PriceQuote};

/// Mock price feed
///
/// Stores fixed prices that can be updated programmatically.
/// Counts fetches so cache behaviour can be asserted.
pub struct MockFeed {
    prices: RwLock<HashMap<MarketId, PriceQuote>>,
    fetches: RwLock<u64>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            fetches: RwLock::new(0),
        }
    }

    /// Set a fixed price for a market
    pub fn set_price(&self, market: impl Into<MarketId>, price_mantissa: Exp) {
        let market = market.into();
        let quote = PriceQuote::simple(market.clone(), price_mantissa);
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(market, quote);
    }

    /// Insert a fully specified quote (e.g. with an old timestamp)
    pub fn set_quote(&self, quote: PriceQuote) {
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(quote.market.clone(), quote);
    }

    /// Remove a price (for testing market not found)
    pub fn remove_price(&self, market: &MarketId) {
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.remove(market);
    }

    /// Number of `fetch_price` calls served so far
    pub fn fetch_count(&self) -> u64 {
        *self.fetches.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    async fn fetch_price(&self, market: &MarketId) -> Result<PriceQuote, OracleError> {
        *self.fetches.write().unwrap_or_else(PoisonError::into_inner) += 1;

        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices
            .get(market)
            .cloned()
            .ok_or_else(|| OracleError::MarketNotFound {
                market: market.to_string(),
            })
    }

    async fn supported_markets(&self) -> Vec<MarketId> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices.keys().cloned().collect()
    }
}
