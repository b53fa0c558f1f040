//! BankerJoe Price Oracle Adapter
//!
//! The engine never fetches prices. Callers resolve a `PriceSnapshot` first
//! (typically through `CachingOracle` over an async `PriceFeed`) and pass it
//! into every query that needs USD valuation.

mod cache;
mod error;
mod mock;
mod types;

pub use cache::CachingOracle;
pub use error::OracleError;
pub use mock::MockFeed;
pub use types::{PriceFeed, PriceQuote, PriceSnapshot, PriceSource};
