//! Market state and interest accrual
//!
//! A market is Fresh when `accrual_timestamp == now` and Stale otherwise.
//! `accrue_interest` moves it to Fresh by advancing the borrow index, total
//! borrows and total reserves. New values are computed first and swapped in
//! only after every step succeeded.

use bankerjoe_core::math::{add, div, mul, mul_mantissa, sub};
use bankerjoe_core::{AccountId, Exp, MarketId, MathResult, U256, EXP_SCALE};
use bankerjoe_events::JoeEvent;
use bankerjoe_rates::InterestRateModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collateral::CollateralLedger;
use crate::error::{MarketError, MarketResult};
use crate::params::{default_borrow_rate_max_per_second, default_flash_fee_bips, MarketParams, MarketVersion};

/// Version tag carrying the state only its variant needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    Vanilla,
    CollateralCap(CollateralLedger),
    WrappedNative,
}

impl MarketKind {
    pub fn version(&self) -> MarketVersion {
        match self {
            MarketKind::Vanilla => MarketVersion::Vanilla,
            MarketKind::CollateralCap(_) => MarketVersion::CollateralCap,
            MarketKind::WrappedNative => MarketVersion::WrappedNative,
        }
    }
}

/// Account borrow principal and the index it was last rebased to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowSnapshot {
    pub principal: U256,
    pub interest_index: U256,
}

/// Everything the risk controller needs about one account in one market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub token_balance: U256,
    /// Tokens counted as collateral (all tokens unless collateral-cap)
    pub collateral_tokens: U256,
    pub borrow_balance: U256,
    pub exchange_rate: Exp,
}

/// Result of a successful accrual computation, not yet committed
#[derive(Debug, Clone, Copy)]
struct Accrual {
    timestamp: u64,
    cash_prior: U256,
    interest_accumulated: U256,
    borrow_index: U256,
    total_borrows: U256,
    total_reserves: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub(crate) id: MarketId,
    pub(crate) kind: MarketKind,
    pub(crate) rate_model: InterestRateModel,
    pub(crate) reserve_factor: Exp,
    pub(crate) initial_exchange_rate: Exp,
    pub(crate) borrow_rate_max: Exp,
    pub(crate) flash_fee_bips: u64,

    pub(crate) cash: U256,
    pub(crate) total_borrows: U256,
    pub(crate) total_reserves: U256,
    pub(crate) total_supply: U256,
    pub(crate) borrow_index: U256,
    pub(crate) accrual_timestamp: u64,

    pub(crate) account_tokens: BTreeMap<AccountId, U256>,
    pub(crate) account_borrows: BTreeMap<AccountId, BorrowSnapshot>,
}

impl Market {
    /// Create an empty market accrued at `now`.
    ///
    /// The initial exchange rate must be positive.
    pub fn new(
        id: MarketId,
        version: MarketVersion,
        rate_model: InterestRateModel,
        initial_exchange_rate: Exp,
        now: u64,
    ) -> MarketResult<Self> {
        if initial_exchange_rate.is_zero() {
            return Err(MarketError::InvalidParameter(
                "initial exchange rate must be positive".to_string(),
            ));
        }

        let kind = match version {
            MarketVersion::Vanilla => MarketKind::Vanilla,
            MarketVersion::CollateralCap => MarketKind::CollateralCap(CollateralLedger::default()),
            MarketVersion::WrappedNative => MarketKind::WrappedNative,
        };

        let borrow_rate_max = Exp::from_decimal(default_borrow_rate_max_per_second())?;

        Ok(Self {
            id,
            kind,
            rate_model,
            reserve_factor: Exp::ZERO,
            initial_exchange_rate,
            borrow_rate_max,
            flash_fee_bips: default_flash_fee_bips(),
            cash: U256::zero(),
            total_borrows: U256::zero(),
            total_reserves: U256::zero(),
            total_supply: U256::zero(),
            borrow_index: EXP_SCALE,
            accrual_timestamp: now,
            account_tokens: BTreeMap::new(),
            account_borrows: BTreeMap::new(),
        })
    }

    /// Create a market from serialized listing parameters
    pub fn from_params(id: MarketId, params: &MarketParams, now: u64) -> MarketResult<Self> {
        let rate_model = params.rate_model.build()?;
        let mut market = Self::new(
            id,
            params.version,
            rate_model,
            Exp::from_decimal(params.initial_exchange_rate)?,
            now,
        )?
        .with_reserve_factor(Exp::from_decimal(params.reserve_factor)?)?
        .with_borrow_rate_max(Exp::from_decimal(params.borrow_rate_max_per_second)?)
        .with_flash_fee_bips(params.flash_fee_bips);

        if let MarketKind::CollateralCap(ledger) = &mut market.kind {
            ledger.set_cap(params.collateral_cap);
        }
        Ok(market)
    }

    pub fn with_reserve_factor(mut self, reserve_factor: Exp) -> MarketResult<Self> {
        if reserve_factor > Exp::ONE {
            return Err(MarketError::InvalidParameter(format!(
                "reserve factor {} above 1",
                reserve_factor
            )));
        }
        self.reserve_factor = reserve_factor;
        Ok(self)
    }

    pub fn with_borrow_rate_max(mut self, borrow_rate_max: Exp) -> Self {
        self.borrow_rate_max = borrow_rate_max;
        self
    }

    pub fn with_flash_fee_bips(mut self, flash_fee_bips: u64) -> Self {
        self.flash_fee_bips = flash_fee_bips;
        self
    }

    // === Views ===

    pub fn id(&self) -> &MarketId {
        &self.id
    }

    pub fn version(&self) -> MarketVersion {
        self.kind.version()
    }

    pub fn kind(&self) -> &MarketKind {
        &self.kind
    }

    pub fn rate_model(&self) -> &InterestRateModel {
        &self.rate_model
    }

    pub fn reserve_factor(&self) -> Exp {
        self.reserve_factor
    }

    pub fn flash_fee_bips(&self) -> u64 {
        self.flash_fee_bips
    }

    pub fn cash(&self) -> U256 {
        self.cash
    }

    pub fn total_borrows(&self) -> U256 {
        self.total_borrows
    }

    pub fn total_reserves(&self) -> U256 {
        self.total_reserves
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn borrow_index(&self) -> U256 {
        self.borrow_index
    }

    pub fn accrual_timestamp(&self) -> u64 {
        self.accrual_timestamp
    }

    pub fn is_fresh(&self, now: u64) -> bool {
        self.accrual_timestamp == now
    }

    pub fn ensure_fresh(&self, now: u64) -> MarketResult<()> {
        if !self.is_fresh(now) {
            return Err(MarketError::NotFresh {
                accrual_timestamp: self.accrual_timestamp,
                now,
            });
        }
        Ok(())
    }

    /// Collateral cap, for collateral-cap markets
    pub fn collateral_cap(&self) -> Option<U256> {
        match &self.kind {
            MarketKind::CollateralCap(ledger) => Some(ledger.collateral_cap()),
            _ => None,
        }
    }

    pub fn total_collateral_tokens(&self) -> Option<U256> {
        match &self.kind {
            MarketKind::CollateralCap(ledger) => Some(ledger.total_collateral_tokens()),
            _ => None,
        }
    }

    pub fn token_balance(&self, account: &AccountId) -> U256 {
        self.account_tokens.get(account).copied().unwrap_or_default()
    }

    /// Tokens that count as collateral for a member of this market
    pub fn collateral_tokens(&self, account: &AccountId) -> U256 {
        match &self.kind {
            MarketKind::CollateralCap(ledger) => ledger.tokens_of(account),
            MarketKind::Vanilla | MarketKind::WrappedNative => self.token_balance(account),
        }
    }

    pub fn borrow_snapshot(&self, account: &AccountId) -> BorrowSnapshot {
        self.account_borrows.get(account).copied().unwrap_or_default()
    }

    pub fn has_borrow(&self, account: &AccountId) -> bool {
        !self.borrow_snapshot(account).principal.is_zero()
    }

    /// `principal * borrow_index / interest_index`, truncated.
    ///
    /// A non-zero principal with a zero index is corrupt data and fails with
    /// `DivideByZero`.
    pub fn borrow_balance_stored(&self, account: &AccountId) -> MathResult<U256> {
        let snapshot = self.borrow_snapshot(account);
        if snapshot.principal.is_zero() {
            return Ok(U256::zero());
        }
        div(mul(snapshot.principal, self.borrow_index)?, snapshot.interest_index)
    }

    /// `(cash + borrows - reserves) / supply`, or the initial rate with no supply
    pub fn exchange_rate_stored(&self) -> MathResult<Exp> {
        if self.total_supply.is_zero() {
            return Ok(self.initial_exchange_rate);
        }
        let underlying = sub(add(self.cash, self.total_borrows)?, self.total_reserves)?;
        Exp::from_ratio(underlying, self.total_supply)
    }

    /// Balances and exchange rate read together for liquidity checks
    pub fn account_snapshot(&self, account: &AccountId) -> MathResult<AccountSnapshot> {
        Ok(AccountSnapshot {
            token_balance: self.token_balance(account),
            collateral_tokens: self.collateral_tokens(account),
            borrow_balance: self.borrow_balance_stored(account)?,
            exchange_rate: self.exchange_rate_stored()?,
        })
    }

    pub fn borrow_rate_per_second(&self) -> MathResult<Exp> {
        self.rate_model
            .get_borrow_rate(self.cash, self.total_borrows, self.total_reserves)
    }

    pub fn supply_rate_per_second(&self) -> MathResult<Exp> {
        self.rate_model.get_supply_rate(
            self.cash,
            self.total_borrows,
            self.total_reserves,
            self.reserve_factor,
        )
    }

    // === Accrual ===

    fn compute_accrual(&self, now: u64) -> MarketResult<Accrual> {
        let delta = now
            .checked_sub(self.accrual_timestamp)
            .ok_or(MarketError::TimestampRegression {
                last: self.accrual_timestamp,
                now,
            })?;

        // Ceiling applies to the per-second rate, not rate * delta
        let borrow_rate = self.borrow_rate_per_second()?;
        if borrow_rate > self.borrow_rate_max {
            return Err(MarketError::ExcessiveInterestRate {
                rate: borrow_rate,
                max: self.borrow_rate_max,
            });
        }

        let interest_factor = borrow_rate.mul_scalar(U256::from(delta))?;
        let interest_accumulated = interest_factor.mul_scalar_truncate(self.total_borrows)?;
        let total_borrows = add(self.total_borrows, interest_accumulated)?;
        let total_reserves = self
            .reserve_factor
            .mul_scalar_truncate_add(interest_accumulated, self.total_reserves)?;
        let borrow_index = add(
            self.borrow_index,
            mul_mantissa(interest_factor.mantissa(), self.borrow_index)?,
        )?;

        Ok(Accrual {
            timestamp: now,
            cash_prior: self.cash,
            interest_accumulated,
            borrow_index,
            total_borrows,
            total_reserves,
        })
    }

    /// Bring the market up to `now`.
    ///
    /// A second call with the same `now` is a no-op and returns `None`.
    /// On any error no field changes.
    pub fn accrue_interest(&mut self, now: u64) -> MarketResult<Option<JoeEvent>> {
        if now == self.accrual_timestamp {
            return Ok(None);
        }

        let accrual = self.compute_accrual(now)?;

        self.accrual_timestamp = accrual.timestamp;
        self.borrow_index = accrual.borrow_index;
        self.total_borrows = accrual.total_borrows;
        self.total_reserves = accrual.total_reserves;

        tracing::debug!(
            market = %self.id,
            interest = %accrual.interest_accumulated,
            borrow_index = %accrual.borrow_index,
            "Interest accrued"
        );

        Ok(Some(JoeEvent::AccrueInterest {
            market: self.id.clone(),
            cash_prior: accrual.cash_prior,
            interest_accumulated: accrual.interest_accumulated,
            borrow_index: accrual.borrow_index,
            total_borrows: accrual.total_borrows,
        }))
    }

    /// Replace the rate model; the market must be fresh.
    pub fn set_rate_model(&mut self, rate_model: InterestRateModel, now: u64) -> MarketResult<()> {
        self.ensure_fresh(now)?;
        self.rate_model = rate_model;
        Ok(())
    }

    pub(crate) fn checked_token_balance_sub(&self, account: &AccountId, amount: U256) -> MarketResult<U256> {
        let balance = self.token_balance(account);
        if balance < amount {
            return Err(MarketError::InsufficientTokens {
                account: account.to_string(),
                available: balance,
                required: amount,
            });
        }
        Ok(balance - amount)
    }
}
