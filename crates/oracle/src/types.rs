//! Core oracle types

use async_trait::async_trait;
use bankerjoe_core::{Exp, MarketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::OracleError;

/// A USD price for one market's underlying, scaled by 1e18.
///
/// A zero price is the "no price available" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Market the price applies to
    pub market: MarketId,
    /// Price per underlying base unit
    pub price_mantissa: Exp,
    /// When the price was observed
    pub timestamp: DateTime<Utc>,
    /// Source of the price (e.g., "mock", "chainlink")
    pub source: String,
}

impl PriceQuote {
    pub fn new(market: MarketId, price_mantissa: Exp, source: impl Into<String>) -> Self {
        Self {
            market,
            price_mantissa,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// Create a mock-sourced quote
    pub fn simple(market: MarketId, price_mantissa: Exp) -> Self {
        Self::new(market, price_mantissa, "mock")
    }

    /// False for the zero sentinel
    pub fn is_available(&self) -> bool {
        !self.price_mantissa.is_zero()
    }

    /// Check if the quote is older than `max_age_secs` at `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age.num_seconds() > max_age_secs as i64
    }
}

/// Synchronous price lookup consumed by the engine.
pub trait PriceSource {
    fn get_price(&self, market: &MarketId) -> Option<PriceQuote>;

    /// Non-zero price mantissa, or `None` if unavailable
    fn price_mantissa(&self, market: &MarketId) -> Option<Exp> {
        self.get_price(market)
            .filter(PriceQuote::is_available)
            .map(|quote| quote.price_mantissa)
    }
}

/// Point-in-time set of quotes, resolved before an engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    quotes: BTreeMap<MarketId, PriceQuote>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a mock quote
    pub fn with_price(mut self, market: impl Into<MarketId>, price_mantissa: Exp) -> Self {
        let market = market.into();
        self.quotes
            .insert(market.clone(), PriceQuote::simple(market, price_mantissa));
        self
    }

    pub fn insert(&mut self, quote: PriceQuote) {
        self.quotes.insert(quote.market.clone(), quote);
    }

    pub fn remove(&mut self, market: &MarketId) -> Option<PriceQuote> {
        self.quotes.remove(market)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn markets(&self) -> impl Iterator<Item = &MarketId> {
        self.quotes.keys()
    }
}

impl PriceSource for PriceSnapshot {
    fn get_price(&self, market: &MarketId) -> Option<PriceQuote> {
        self.quotes.get(market).cloned()
    }
}

/// External price feed - the async collaborator behind the snapshot.
///
/// Implementations can be:
/// - MockFeed: fixed prices for tests
/// - an RPC/Chainlink adapter in the embedding service
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the current price for a market
    async fn fetch_price(&self, market: &MarketId) -> Result<PriceQuote, OracleError>;

    /// Fetch prices for multiple markets at once
    async fn fetch_prices(&self, markets: &[MarketId]) -> Vec<Result<PriceQuote, OracleError>> {
        let mut results = Vec::new();
        for market in markets {
            results.push(self.fetch_price(market).await);
        }
        results
    }

    /// Markets this feed can price
    async fn supported_markets(&self) -> Vec<MarketId>;
}
