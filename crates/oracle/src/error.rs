//! Oracle error types

use thiserror::Error;

/// Oracle-related errors
#[derive(Debug, Error)]
pub enum OracleError {
    /// Feed has no price for the market
    #[error("No price feed for market: {market}")]
    MarketNotFound { market: String },

    /// Price data is stale (older than threshold)
    #[error("Stale price for {market}: last update was {last_update}, threshold is {threshold_secs}s")]
    StalePrice {
        market: String,
        last_update: String,
        threshold_secs: u64,
    },

    /// Feed returned an unusable quote (zero price)
    #[error("Invalid price for {market}: {reason}")]
    InvalidPrice { market: String, reason: String },
}
