//! Rate model errors

use bankerjoe_core::{Exp, MathError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateModelError {
    #[error("kink {kink} is above roof {roof}")]
    KinkAboveRoof { kink: Exp, roof: Exp },

    #[error("kink1 {kink1} is above kink2 {kink2}")]
    KinksOutOfOrder { kink1: Exp, kink2: Exp },

    #[error("roof must be positive")]
    ZeroRoof,

    #[error("seconds per year must be positive")]
    ZeroSecondsPerYear,

    #[error(transparent)]
    Math(#[from] MathError),
}
