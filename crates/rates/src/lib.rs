//! BankerJoe Interest Rate Models
//!
//! Borrow and supply rates as a function of market utilization.
//! Models are immutable values; invalid kink/roof layouts fail construction.

mod config;
mod error;
mod model;

pub use config::{RateModelConfig, SECONDS_PER_YEAR};
pub use error::RateModelError;
pub use model::{utilization_rate, InterestRateModel, JumpRateModel, TripleSlopeModel};
