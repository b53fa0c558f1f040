//! BankerJoe Risk Controller
//!
//! The `Joetroller` lists markets, tracks account memberships and credit
//! limits, computes account liquidity from a price snapshot, gates every
//! market operation and runs liquidations.
//!
//! The controller does no I/O. Prices are resolved beforehand into a
//! `PriceSource`; every successful mutation returns the events it produced.

mod actions;
pub mod config;
pub mod controller;
pub mod error;
mod hooks;
pub mod liquidation;
pub mod liquidity;
pub mod sync;

pub use config::ControllerConfig;
pub use controller::{Joetroller, MarketConfig};
pub use error::{CapKind, JoeError, JoeResult, Rejection, Verdict};
pub use liquidation::LiquidationReceipt;
pub use liquidity::AccountLiquidity;
pub use sync::MarketLocks;
