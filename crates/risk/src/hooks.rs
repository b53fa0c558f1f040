//! Gating hooks
//!
//! Each hook answers whether an operation may proceed. "Not allowed" comes
//! back as `Verdict::Reject`; missing prices and arithmetic failures are
//! errors.

use bankerjoe_core::{math, AccountId, MarketId, U256};
use bankerjoe_oracle::PriceSource;

use crate::controller::Joetroller;
use crate::error::{CapKind, JoeError, JoeResult, Rejection, Verdict};
use crate::liquidity::Adjustment;

fn allow(hook: &'static str, market: &MarketId) -> JoeResult<Verdict> {
    tracing::debug!(hook, market = %market, "Allowed");
    Ok(Verdict::Allow)
}

fn reject(hook: &'static str, market: &MarketId, rejection: Rejection) -> JoeResult<Verdict> {
    tracing::warn!(hook, market = %market, reason = %rejection, "Rejected");
    Ok(Verdict::Reject(rejection))
}

/// `cap != 0 && current + delta > cap`
fn cap_check(kind: CapKind, cap: U256, current: U256, delta: U256) -> JoeResult<Option<Rejection>> {
    if cap.is_zero() {
        return Ok(None);
    }
    let new_total = math::add(current, delta)?;
    if new_total > cap {
        return Ok(Some(Rejection::CapExceeded {
            kind,
            cap,
            new_total,
        }));
    }
    Ok(None)
}

impl Joetroller {
    /// The supply cap bounds underlying supplied: `cash + borrows - reserves`
    /// after adding `mint_amount`.
    pub fn mint_allowed(&self, market: &MarketId, minter: &AccountId, mint_amount: U256) -> JoeResult<Verdict> {
        const HOOK: &str = "mint_allowed";
        let Ok(listed) = self.listed(market) else {
            return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
        };
        if listed.config.mint_paused {
            return reject(HOOK, market, Rejection::MintPaused);
        }
        let state = &listed.state;
        let supplied = math::sub(
            math::add(state.cash(), state.total_borrows())?,
            state.total_reserves(),
        )?;
        if let Some(rejection) =
            cap_check(CapKind::Supply, listed.config.supply_cap, supplied, mint_amount)?
        {
            return reject(HOOK, market, rejection);
        }

        tracing::trace!(minter = %minter, amount = %mint_amount, "Mint checks passed");
        allow(HOOK, market)
    }

    /// `redeem_tokens` is the collateral part of the redeemed tokens.
    /// Non-members may always redeem.
    pub fn redeem_allowed(
        &self,
        market: &MarketId,
        redeemer: &AccountId,
        redeem_tokens: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<Verdict> {
        const HOOK: &str = "redeem_allowed";
        if self.listed(market).is_err() {
            return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
        }
        if !self.check_membership(redeemer, market) || redeem_tokens.is_zero() {
            return allow(HOOK, market);
        }

        let liquidity = self.get_hypothetical_account_liquidity(redeemer, market, redeem_tokens, U256::zero(), prices)?;
        if liquidity.has_shortfall() {
            return reject(
                HOOK,
                market,
                Rejection::InsufficientLiquidity {
                    shortfall: liquidity.shortfall,
                },
            );
        }
        allow(HOOK, market)
    }

    /// Borrow check for an account already in `market`
    pub fn borrow_allowed(
        &self,
        market: &MarketId,
        borrower: &AccountId,
        borrow_amount: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<Verdict> {
        self.borrow_allowed_with(market, borrower, borrow_amount, None, prices)
    }

    /// Borrow check; `entering_collateral` is set when the borrow also
    /// enters the market and holds the collateral the account would register.
    pub(crate) fn borrow_allowed_with(
        &self,
        market: &MarketId,
        borrower: &AccountId,
        borrow_amount: U256,
        entering_collateral: Option<U256>,
        prices: &impl PriceSource,
    ) -> JoeResult<Verdict> {
        const HOOK: &str = "borrow_allowed";
        let Ok(listed) = self.listed(market) else {
            return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
        };
        if listed.config.borrow_paused {
            return reject(HOOK, market, Rejection::BorrowPaused);
        }
        if prices.price_mantissa(market).is_none() {
            return Err(JoeError::PriceUnavailable(market.clone()));
        }
        if let Some(rejection) = cap_check(
            CapKind::Borrow,
            listed.config.borrow_cap,
            listed.state.total_borrows(),
            borrow_amount,
        )? {
            return reject(HOOK, market, rejection);
        }

        let adjustment = Adjustment {
            market,
            redeem_tokens: U256::zero(),
            borrow_amount,
            entering_collateral,
        };
        let liquidity = self.liquidity_with(borrower, Some(&adjustment), prices)?;
        if liquidity.has_shortfall() {
            return reject(
                HOOK,
                market,
                Rejection::InsufficientLiquidity {
                    shortfall: liquidity.shortfall,
                },
            );
        }
        allow(HOOK, market)
    }

    pub fn repay_borrow_allowed(&self, market: &MarketId) -> JoeResult<Verdict> {
        const HOOK: &str = "repay_borrow_allowed";
        if self.listed(market).is_err() {
            return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
        }
        allow(HOOK, market)
    }

    /// Same liquidity rule as redeeming the transferred collateral tokens
    pub fn transfer_allowed(
        &self,
        market: &MarketId,
        src: &AccountId,
        collateral_tokens: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<Verdict> {
        if self.transfer_paused {
            return reject("transfer_allowed", market, Rejection::TransferPaused);
        }
        self.redeem_allowed(market, src, collateral_tokens, prices)
    }

    pub fn seize_allowed(&self, market_collateral: &MarketId, market_borrowed: &MarketId) -> JoeResult<Verdict> {
        const HOOK: &str = "seize_allowed";
        if self.seize_paused {
            return reject(HOOK, market_collateral, Rejection::SeizePaused);
        }
        for market in [market_collateral, market_borrowed] {
            if self.listed(market).is_err() {
                return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
            }
        }
        allow(HOOK, market_collateral)
    }

    pub fn flashloan_allowed(&self, market: &MarketId, receiver: &AccountId, amount: U256) -> JoeResult<Verdict> {
        const HOOK: &str = "flashloan_allowed";
        let Ok(listed) = self.listed(market) else {
            return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
        };
        if listed.config.flashloan_paused {
            return reject(HOOK, market, Rejection::FlashloanPaused);
        }
        let cash = listed.state.cash();
        if amount > cash {
            return reject(
                HOOK,
                market,
                Rejection::InsufficientCash {
                    available: cash,
                    required: amount,
                },
            );
        }

        tracing::trace!(receiver = %receiver, amount = %amount, "Flashloan checks passed");
        allow(HOOK, market)
    }

    /// Borrower must be in shortfall, must not be a credit account, and
    /// `repay_amount` must fit within `close_factor * borrow_balance`.
    pub fn liquidate_borrow_allowed(
        &self,
        market_borrowed: &MarketId,
        market_collateral: &MarketId,
        liquidator: &AccountId,
        borrower: &AccountId,
        repay_amount: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<Verdict> {
        const HOOK: &str = "liquidate_borrow_allowed";
        for market in [market_borrowed, market_collateral] {
            if self.listed(market).is_err() {
                return reject(HOOK, market, Rejection::MarketNotListed(market.clone()));
            }
        }
        if self.is_credit_account(borrower) {
            return reject(HOOK, market_borrowed, Rejection::CreditAccountNotLiquidatable);
        }

        let liquidity = self.get_account_liquidity(borrower, prices)?;
        if !liquidity.has_shortfall() {
            return reject(HOOK, market_borrowed, Rejection::InsufficientShortfall);
        }

        let borrow_balance = self.listed(market_borrowed)?.state.borrow_balance_stored(borrower)?;
        let max_close = self.close_factor.mul_scalar_truncate(borrow_balance)?;
        if repay_amount > max_close {
            return reject(
                HOOK,
                market_borrowed,
                Rejection::TooMuchRepay {
                    repay_amount,
                    max_close,
                },
            );
        }

        tracing::trace!(liquidator = %liquidator, borrower = %borrower, "Liquidation checks passed");
        allow(HOOK, market_borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_zero_is_unlimited() {
        let result = cap_check(CapKind::Supply, U256::zero(), U256::MAX - 1, U256::one()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_cap_equality_allowed() {
        let at_cap = cap_check(CapKind::Borrow, U256::from(100), U256::from(60), U256::from(40)).unwrap();
        assert!(at_cap.is_none());

        let over = cap_check(CapKind::Borrow, U256::from(100), U256::from(60), U256::from(41)).unwrap();
        assert_eq!(
            over,
            Some(Rejection::CapExceeded {
                kind: CapKind::Borrow,
                cap: U256::from(100),
                new_total: U256::from(101),
            })
        );
    }
}
