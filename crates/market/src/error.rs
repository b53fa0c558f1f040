//! Market errors

use bankerjoe_core::{Exp, MathError, U256};
use bankerjoe_rates::RateModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("arithmetic error: {0}")]
    Math(#[from] MathError),

    #[error("borrow rate {rate} exceeds maximum {max}")]
    ExcessiveInterestRate { rate: Exp, max: Exp },

    #[error("timestamp {now} is before last accrual at {last}")]
    TimestampRegression { last: u64, now: u64 },

    #[error("market not fresh: accrued at {accrual_timestamp}, now {now}")]
    NotFresh { accrual_timestamp: u64, now: u64 },

    #[error("insufficient cash: available {available}, required {required}")]
    InsufficientCash { available: U256, required: U256 },

    #[error("insufficient tokens for {account}: available {available}, required {required}")]
    InsufficientTokens {
        account: String,
        available: U256,
        required: U256,
    },

    #[error("source and destination accounts are the same")]
    InvalidAccountPair,

    #[error("flashloan repaid {repaid}, required {required}")]
    InsufficientFlashloanRepay { required: U256, repaid: U256 },

    #[error("invalid market parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid rate model: {0}")]
    RateModel(#[from] RateModelError),
}

pub type MarketResult<T> = Result<T, MarketError>;
