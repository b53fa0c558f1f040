//! BankerJoe Core - Domain types shared by every engine crate
//!
//! - `MarketId` / `AccountId`: opaque handles for markets and accounts
//! - `Exp`: 18-decimal fixed-point mantissa with checked arithmetic
//! - `MathError`: overflow / underflow / divide-by-zero

pub mod ids;
pub mod math;

pub use ids::{AccountId, MarketId};
pub use math::{Exp, MathError, MathResult, EXP_SCALE, MANTISSA_DECIMALS};
pub use primitive_types::U256;
