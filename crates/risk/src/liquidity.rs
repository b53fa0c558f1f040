//! Account liquidity
//!
//! Values are in the oracle's price unit. For each relevant market:
//! collateral = tokens * exchange_rate * price * collateral_factor and
//! borrow = borrow_balance * price. Credit accounts compare their borrows
//! against the credit limit instead and ignore collateral.

use bankerjoe_core::{AccountId, Exp, MarketId, U256};
use bankerjoe_oracle::PriceSource;

use crate::controller::Joetroller;
use crate::error::{JoeError, JoeResult};

/// Excess collateral or missing collateral; at most one is non-zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountLiquidity {
    pub liquidity: U256,
    pub shortfall: U256,
}

impl AccountLiquidity {
    fn from_sums(available: U256, required: U256) -> Self {
        if available > required {
            Self {
                liquidity: available - required,
                shortfall: U256::zero(),
            }
        } else {
            Self {
                liquidity: U256::zero(),
                shortfall: required - available,
            }
        }
    }

    pub fn has_shortfall(&self) -> bool {
        !self.shortfall.is_zero()
    }
}

/// Hypothetical change applied to one market before summing
#[derive(Debug, Clone, Copy)]
pub(crate) struct Adjustment<'a> {
    pub(crate) market: &'a MarketId,
    pub(crate) redeem_tokens: U256,
    pub(crate) borrow_amount: U256,
    /// Collateral tokens the account would hold after entering `market`
    pub(crate) entering_collateral: Option<U256>,
}

impl Joetroller {
    /// Current liquidity of `account` under `prices`
    pub fn get_account_liquidity(
        &self,
        account: &AccountId,
        prices: &impl PriceSource,
    ) -> JoeResult<AccountLiquidity> {
        self.liquidity_with(account, None, prices)
    }

    /// Liquidity of `account` as if it had redeemed `redeem_tokens` from and
    /// borrowed `borrow_amount` in `market`
    pub fn get_hypothetical_account_liquidity(
        &self,
        account: &AccountId,
        market: &MarketId,
        redeem_tokens: U256,
        borrow_amount: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<AccountLiquidity> {
        let adjustment = Adjustment {
            market,
            redeem_tokens,
            borrow_amount,
            entering_collateral: None,
        };
        self.liquidity_with(account, Some(&adjustment), prices)
    }

    pub(crate) fn liquidity_with(
        &self,
        account: &AccountId,
        adjustment: Option<&Adjustment<'_>>,
        prices: &impl PriceSource,
    ) -> JoeResult<AccountLiquidity> {
        let mut markets = self.relevant_markets(account);
        if let Some(adjustment) = adjustment {
            markets.insert(adjustment.market.clone());
        }

        let credit_limit = self.credit_limit(account);
        let mut sum_collateral = U256::zero();
        let mut sum_borrow = U256::zero();

        for id in &markets {
            let adjusted = adjustment.filter(|a| a.market == id);
            let Some(listed) = self.markets.get(id) else {
                if adjusted.is_some() {
                    return Err(JoeError::MarketNotListed(id.clone()));
                }
                return Err(JoeError::InvariantViolation(format!(
                    "account {} is a member of unknown market {}",
                    account, id
                )));
            };
            let price = prices
                .price_mantissa(id)
                .ok_or_else(|| JoeError::PriceUnavailable(id.clone()))?;
            let snapshot = listed.state.account_snapshot(account)?;

            sum_borrow = price.mul_scalar_truncate_add(snapshot.borrow_balance, sum_borrow)?;
            if let Some(adjusted) = adjusted {
                sum_borrow = price.mul_scalar_truncate_add(adjusted.borrow_amount, sum_borrow)?;
            }

            if credit_limit.is_some() || !listed.config.is_listed {
                continue;
            }

            let entering = adjusted.and_then(|a| a.entering_collateral);
            if !self.check_membership(account, id) && entering.is_none() {
                continue;
            }

            let collateral_tokens = entering.unwrap_or(snapshot.collateral_tokens);
            let tokens_to_denom: Exp = listed
                .config
                .collateral_factor
                .mul(snapshot.exchange_rate)?
                .mul(price)?;
            sum_collateral = tokens_to_denom.mul_scalar_truncate_add(collateral_tokens, sum_collateral)?;
            if let Some(adjusted) = adjusted {
                sum_borrow = tokens_to_denom.mul_scalar_truncate_add(adjusted.redeem_tokens, sum_borrow)?;
            }
        }

        let result = match credit_limit {
            Some(limit) => AccountLiquidity::from_sums(limit, sum_borrow),
            None => AccountLiquidity::from_sums(sum_collateral, sum_borrow),
        };

        tracing::debug!(
            account = %account,
            liquidity = %result.liquidity,
            shortfall = %result.shortfall,
            "Account liquidity computed"
        );
        Ok(result)
    }
}
