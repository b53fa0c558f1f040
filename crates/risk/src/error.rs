//! Controller errors and gating verdicts

use bankerjoe_core::{AccountId, Exp, MarketId, MathError, U256};
use bankerjoe_market::MarketError;
use bankerjoe_rates::RateModelError;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Which cap a `CapExceeded` rejection refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CapKind {
    Supply,
    Borrow,
}

/// Reason a gating hook refused an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("market {0} is not listed")]
    MarketNotListed(MarketId),

    #[error("mint is paused")]
    MintPaused,

    #[error("borrow is paused")]
    BorrowPaused,

    #[error("transfer is paused")]
    TransferPaused,

    #[error("seize is paused")]
    SeizePaused,

    #[error("flashloan is paused")]
    FlashloanPaused,

    #[error("{kind} cap {cap} exceeded: new total {new_total}")]
    CapExceeded {
        kind: CapKind,
        cap: U256,
        new_total: U256,
    },

    #[error("insufficient liquidity: shortfall {shortfall}")]
    InsufficientLiquidity { shortfall: U256 },

    #[error("borrower has no shortfall")]
    InsufficientShortfall,

    #[error("repay {repay_amount} exceeds close limit {max_close}")]
    TooMuchRepay { repay_amount: U256, max_close: U256 },

    #[error("account still borrows in market")]
    NonzeroBorrowBalance,

    #[error("credit accounts cannot be liquidated")]
    CreditAccountNotLiquidatable,

    #[error("seize {seize_tokens} exceeds borrower collateral {balance}")]
    SeizeTooMuch { seize_tokens: U256, balance: U256 },

    #[error("insufficient cash: available {available}, required {required}")]
    InsufficientCash { available: U256, required: U256 },
}

/// Outcome of a gating hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// Turn a rejection into `JoeError::Rejected`
    pub fn into_result(self) -> JoeResult<()> {
        match self {
            Verdict::Allow => Ok(()),
            Verdict::Reject(rejection) => Err(JoeError::Rejected(rejection)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoeError {
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] MathError),

    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: AccountId,
        action: &'static str,
    },

    #[error("market {0} is not listed")]
    MarketNotListed(MarketId),

    #[error("market {0} is already listed")]
    MarketAlreadyListed(MarketId),

    #[error("market {market} not fresh: accrued at {accrual_timestamp}, now {now}")]
    MarketNotFresh {
        market: MarketId,
        accrual_timestamp: u64,
        now: u64,
    },

    #[error("no price for market {0}")]
    PriceUnavailable(MarketId),

    #[error("liquidator and borrower are the same account")]
    InvalidAccountPair,

    #[error("invalid close amount")]
    InvalidCloseAmount,

    #[error("borrow rate {rate} exceeds maximum {max}")]
    ExcessiveInterestRate { rate: Exp, max: Exp },

    #[error("insufficient cash: available {available}, required {required}")]
    InsufficientCash { available: U256, required: U256 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("rejected: {0}")]
    Rejected(Rejection),

    #[error("market {market}: {source}")]
    Market {
        market: MarketId,
        #[source]
        source: MarketError,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl JoeError {
    /// Only a broken engine invariant is fatal; everything else is the
    /// caller's to handle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JoeError::InvariantViolation(_))
    }

    /// Lift a market error into the controller taxonomy
    pub fn from_market(market: &MarketId, error: MarketError) -> Self {
        match error {
            MarketError::Math(e) => JoeError::Arithmetic(e),
            MarketError::ExcessiveInterestRate { rate, max } => {
                JoeError::ExcessiveInterestRate { rate, max }
            }
            MarketError::NotFresh {
                accrual_timestamp,
                now,
            } => JoeError::MarketNotFresh {
                market: market.clone(),
                accrual_timestamp,
                now,
            },
            MarketError::InsufficientCash {
                available,
                required,
            } => JoeError::InsufficientCash {
                available,
                required,
            },
            MarketError::InvalidAccountPair => JoeError::InvalidAccountPair,
            MarketError::InvalidParameter(msg) => JoeError::InvalidParameter(msg),
            MarketError::RateModel(RateModelError::Math(e)) => JoeError::Arithmetic(e),
            other => JoeError::Market {
                market: market.clone(),
                source: other,
            },
        }
    }
}

/// Shorthand for `map_err` on market calls
pub(crate) fn market_err(market: &MarketId) -> impl Fn(MarketError) -> JoeError + '_ {
    move |e| JoeError::from_market(market, e)
}

pub type JoeResult<T> = Result<T, JoeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invariant_violation_is_fatal() {
        assert!(JoeError::InvariantViolation("negative balance".into()).is_fatal());
        assert!(!JoeError::Arithmetic(MathError::Overflow).is_fatal());
        assert!(!JoeError::Rejected(Rejection::MintPaused).is_fatal());
    }

    #[test]
    fn test_market_error_mapping() {
        let market = MarketId::new("jUSDC");
        let err = JoeError::from_market(
            &market,
            MarketError::NotFresh {
                accrual_timestamp: 1,
                now: 2,
            },
        );
        assert_eq!(
            err,
            JoeError::MarketNotFresh {
                market: market.clone(),
                accrual_timestamp: 1,
                now: 2
            }
        );

        let err = JoeError::from_market(&market, MarketError::Math(MathError::Underflow));
        assert_eq!(err, JoeError::Arithmetic(MathError::Underflow));
    }

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Allow.into_result().is_ok());
        assert_eq!(
            Verdict::Reject(Rejection::SeizePaused).into_result(),
            Err(JoeError::Rejected(Rejection::SeizePaused))
        );
    }

    #[test]
    fn test_cap_rejection_message() {
        let rejection = Rejection::CapExceeded {
            kind: CapKind::Supply,
            cap: U256::from(10),
            new_total: U256::from(11),
        };
        assert_eq!(rejection.to_string(), "supply cap 10 exceeded: new total 11");
    }
}
