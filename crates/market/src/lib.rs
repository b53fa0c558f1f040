//! BankerJoe Market - per-market accrual and token ledger
//!
//! A `Market` owns its balances (cash, borrows, reserves, supply), its borrow
//! index and every account's token and borrow records. Interest accrues with
//! `accrue_interest`; all ledger operations require a fresh market.
//!
//! Ledger mutations are two-phase: `prepare_*` computes every new value with
//! checked arithmetic and returns a plan, `apply_*` commits it. Callers that
//! touch two markets prepare both before applying either.

mod collateral;
mod error;
mod ledger;
mod market;
mod params;

pub use collateral::{CollateralLedger, CollateralPlan};
pub use error::MarketError;
pub use ledger::{BorrowPlan, FlashloanPlan, MintPlan, RedeemPlan, RepayPlan, SeizePlan, TransferPlan};
pub use market::{AccountSnapshot, BorrowSnapshot, Market, MarketKind};
pub use params::{MarketParams, MarketVersion};
