//! Liquidation engine
//!
//! A liquidator repays part of a shortfall account's borrow and receives the
//! borrower's collateral tokens plus the liquidation incentive.

use bankerjoe_core::{AccountId, MarketId, U256};
use bankerjoe_events::JoeEvent;
use bankerjoe_oracle::PriceSource;

use crate::controller::Joetroller;
use crate::error::{market_err, JoeError, JoeResult, Rejection};

/// Outcome of a successful liquidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationReceipt {
    pub repay_amount: U256,
    pub seize_tokens: U256,
    pub events: Vec<JoeEvent>,
}

impl Joetroller {
    /// Collateral tokens to seize for `repay_amount` of borrowed underlying:
    ///
    /// `repay * incentive * price_borrowed / (price_collateral * exchange_rate)`
    pub fn liquidate_calculate_seize_tokens(
        &self,
        market_borrowed: &MarketId,
        market_collateral: &MarketId,
        repay_amount: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<U256> {
        let price_borrowed = prices
            .price_mantissa(market_borrowed)
            .ok_or_else(|| JoeError::PriceUnavailable(market_borrowed.clone()))?;
        let price_collateral = prices
            .price_mantissa(market_collateral)
            .ok_or_else(|| JoeError::PriceUnavailable(market_collateral.clone()))?;

        let exchange_rate = self
            .market(market_collateral)
            .ok_or_else(|| JoeError::MarketNotListed(market_collateral.clone()))?
            .exchange_rate_stored()?;

        let numerator = self.liquidation_incentive.mul(price_borrowed)?;
        let denominator = price_collateral.mul(exchange_rate)?;
        let ratio = numerator.div(denominator)?;
        Ok(ratio.mul_scalar_truncate(repay_amount)?)
    }

    /// Repay `repay_amount` of `borrower`'s debt in `market_borrowed` and
    /// seize collateral from `market_collateral`.
    ///
    /// Both markets must already be accrued to `now`. Nothing changes unless
    /// every step succeeds.
    #[allow(clippy::too_many_arguments)]
    pub fn liquidate_borrow(
        &mut self,
        liquidator: &AccountId,
        borrower: &AccountId,
        market_borrowed: &MarketId,
        market_collateral: &MarketId,
        repay_amount: U256,
        now: u64,
        prices: &impl PriceSource,
    ) -> JoeResult<LiquidationReceipt> {
        if liquidator == borrower {
            return Err(JoeError::InvalidAccountPair);
        }
        if repay_amount.is_zero() || repay_amount == U256::MAX {
            return Err(JoeError::InvalidCloseAmount);
        }

        for market in [market_borrowed, market_collateral] {
            let state = &self.listed(market)?.state;
            if !state.is_fresh(now) {
                return Err(JoeError::MarketNotFresh {
                    market: market.clone(),
                    accrual_timestamp: state.accrual_timestamp(),
                    now,
                });
            }
        }

        self.liquidate_borrow_allowed(market_borrowed, market_collateral, liquidator, borrower, repay_amount, prices)?
            .into_result()?;
        self.repay_borrow_allowed(market_borrowed)?.into_result()?;

        let repay_plan = self
            .listed(market_borrowed)?
            .state
            .prepare_repay(liquidator, borrower, repay_amount, now)
            .map_err(market_err(market_borrowed))?;

        let seize_tokens = self.liquidate_calculate_seize_tokens(
            market_borrowed,
            market_collateral,
            repay_plan.repay_amount,
            prices,
        )?;
        let collateral_state = &self.listed(market_collateral)?.state;
        let balance = collateral_state.collateral_tokens(borrower);
        if seize_tokens > balance {
            tracing::warn!(borrower = %borrower, seize = %seize_tokens, balance = %balance, "Seize exceeds balance");
            return Err(JoeError::Rejected(Rejection::SeizeTooMuch { seize_tokens, balance }));
        }

        self.seize_allowed(market_collateral, market_borrowed)?.into_result()?;

        let seize_plan = collateral_state
            .prepare_seize(liquidator, borrower, seize_tokens, now)
            .map_err(market_err(market_collateral))?;

        // Both plans are valid; commit.
        let repaid = repay_plan.repay_amount;
        let mut events = self.listed_mut(market_borrowed)?.state.apply_repay(repay_plan);
        events.extend(self.listed_mut(market_collateral)?.state.apply_seize(seize_plan));
        events.push(JoeEvent::LiquidateBorrow {
            liquidator: liquidator.clone(),
            borrower: borrower.clone(),
            market_borrowed: market_borrowed.clone(),
            repay_amount: repaid,
            market_collateral: market_collateral.clone(),
            seize_tokens,
        });

        tracing::info!(
            liquidator = %liquidator,
            borrower = %borrower,
            market_borrowed = %market_borrowed,
            market_collateral = %market_collateral,
            repay = %repaid,
            seize = %seize_tokens,
            "Borrow liquidated"
        );
        Ok(LiquidationReceipt {
            repay_amount: repaid,
            seize_tokens,
            events,
        })
    }
}
