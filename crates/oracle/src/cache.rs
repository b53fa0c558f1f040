//! Caching oracle - resolves snapshots from a feed with a TTL cache

use bankerjoe_core::MarketId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::OracleError;
use crate::types::{PriceFeed, PriceQuote, PriceSnapshot};

/// Wraps a `PriceFeed` and reuses quotes younger than `ttl_secs`.
///
/// Quotes the feed returns already older than `max_age_secs` are rejected
/// as stale instead of being cached.
pub struct CachingOracle<F: PriceFeed> {
    feed: F,
    ttl_secs: u64,
    max_age_secs: u64,
    cache: RwLock<HashMap<MarketId, PriceQuote>>,
}

impl<F: PriceFeed> CachingOracle<F> {
    pub fn new(feed: F, ttl_secs: u64, max_age_secs: u64) -> Self {
        Self {
            feed,
            ttl_secs,
            max_age_secs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    fn cached(&self, market: &MarketId, now: DateTime<Utc>) -> Option<PriceQuote> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(market)
            .filter(|quote| !quote.is_stale_at(now, self.ttl_secs))
            .cloned()
    }

    /// Resolve one market's quote, from cache or feed
    pub async fn quote(&self, market: &MarketId) -> Result<PriceQuote, OracleError> {
        let now = Utc::now();
        if let Some(quote) = self.cached(market, now) {
            tracing::debug!(market = %market, "Price cache hit");
            return Ok(quote);
        }

        tracing::debug!(market = %market, "Price cache miss, fetching");
        let quote = self.feed.fetch_price(market).await?;
        if !quote.is_available() {
            return Err(OracleError::InvalidPrice {
                market: market.to_string(),
                reason: "zero price".to_string(),
            });
        }
        if quote.is_stale_at(now, self.max_age_secs) {
            return Err(OracleError::StalePrice {
                market: market.to_string(),
                last_update: quote.timestamp.to_rfc3339(),
                threshold_secs: self.max_age_secs,
            });
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(market.clone(), quote.clone());
        Ok(quote)
    }

    /// Build a snapshot covering `markets`.
    ///
    /// Markets the feed does not know or prices at zero are left out; the
    /// engine then fails the dependent operation with a price-unavailable
    /// error. Any other feed failure aborts the snapshot.
    pub async fn snapshot(&self, markets: &[MarketId]) -> Result<PriceSnapshot, OracleError> {
        let mut snapshot = PriceSnapshot::new();
        for market in markets {
            match self.quote(market).await {
                Ok(quote) => snapshot.insert(quote),
                Err(e @ (OracleError::MarketNotFound { .. } | OracleError::InvalidPrice { .. })) => {
                    tracing::warn!(market = %market, error = %e, "No usable price, omitted from snapshot");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(snapshot)
    }

    /// Drop a cached quote
    pub fn invalidate(&self, market: &MarketId) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.remove(market);
    }

    /// Drop all cached quotes
    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
    }
}
