//! User operations
//!
//! Ledger operations never accrue on their own; the market must already be
//! accrued to `now`. Each one prepares a market plan, runs its hook and only
//! then commits.

use bankerjoe_core::{AccountId, MarketId, U256};
use bankerjoe_events::JoeEvent;
use bankerjoe_oracle::PriceSource;

use crate::controller::Joetroller;
use crate::error::{market_err, JoeResult};

impl Joetroller {
    /// Accrue interest on one market up to `now`
    pub fn accrue_interest(&mut self, market: &MarketId, now: u64) -> JoeResult<Option<JoeEvent>> {
        self.listed_mut(market)?
            .state
            .accrue_interest(now)
            .map_err(market_err(market))
    }

    /// Accrue every listed market; stops at the first failure
    pub fn accrue_all(&mut self, now: u64) -> JoeResult<Vec<JoeEvent>> {
        let mut events = Vec::new();
        for (id, listed) in self.markets.iter_mut().filter(|(_, m)| m.config.is_listed) {
            if let Some(event) = listed.state.accrue_interest(now).map_err(market_err(id))? {
                events.push(event);
            }
        }
        Ok(events)
    }

    pub fn mint(
        &mut self,
        minter: &AccountId,
        market: &MarketId,
        mint_amount: U256,
        now: u64,
    ) -> JoeResult<Vec<JoeEvent>> {
        let is_member = self.check_membership(minter, market);
        let plan = self
            .listed(market)?
            .state
            .prepare_mint(minter, mint_amount, is_member, now)
            .map_err(market_err(market))?;
        self.mint_allowed(market, minter, mint_amount)?
            .into_result()?;

        tracing::debug!(minter = %minter, market = %market, amount = %mint_amount, "Mint");
        Ok(self.listed_mut(market)?.state.apply_mint(plan))
    }

    pub fn redeem(
        &mut self,
        redeemer: &AccountId,
        market: &MarketId,
        redeem_tokens: U256,
        now: u64,
        prices: &impl PriceSource,
    ) -> JoeResult<Vec<JoeEvent>> {
        let plan = self
            .listed(market)?
            .state
            .prepare_redeem(redeemer, redeem_tokens, now)
            .map_err(market_err(market))?;
        self.redeem_allowed(market, redeemer, plan.collateral_tokens_removed, prices)?
            .into_result()?;

        tracing::debug!(redeemer = %redeemer, market = %market, tokens = %redeem_tokens, "Redeem");
        Ok(self.listed_mut(market)?.state.apply_redeem(plan))
    }

    pub fn redeem_underlying(
        &mut self,
        redeemer: &AccountId,
        market: &MarketId,
        redeem_amount: U256,
        now: u64,
        prices: &impl PriceSource,
    ) -> JoeResult<Vec<JoeEvent>> {
        let plan = self
            .listed(market)?
            .state
            .prepare_redeem_underlying(redeemer, redeem_amount, now)
            .map_err(market_err(market))?;
        self.redeem_allowed(market, redeemer, plan.collateral_tokens_removed, prices)?
            .into_result()?;

        tracing::debug!(redeemer = %redeemer, market = %market, amount = %redeem_amount, "Redeem underlying");
        Ok(self.listed_mut(market)?.state.apply_redeem(plan))
    }

    /// Borrow from `market`, entering it first when the borrower is not a
    /// member yet.
    pub fn borrow(
        &mut self,
        borrower: &AccountId,
        market: &MarketId,
        borrow_amount: U256,
        now: u64,
        prices: &impl PriceSource,
    ) -> JoeResult<Vec<JoeEvent>> {
        let listed = self.listed(market)?;
        let plan = listed
            .state
            .prepare_borrow(borrower, borrow_amount, now)
            .map_err(market_err(market))?;

        let entering_collateral = if self.check_membership(borrower, market) {
            None
        } else {
            let registration = listed
                .state
                .prepare_register_collateral(borrower)
                .map_err(market_err(market))?;
            let registered = registration
                .as_ref()
                .and_then(|p| p.accounts.iter().find(|(a, _)| a == borrower))
                .map(|(_, tokens)| *tokens)
                .unwrap_or_else(|| listed.state.collateral_tokens(borrower));
            Some(registered)
        };

        self.borrow_allowed_with(market, borrower, borrow_amount, entering_collateral, prices)?
            .into_result()?;

        let mut events = Vec::new();
        if entering_collateral.is_some() {
            events.extend(self.enter_market(borrower, market)?);
        }
        events.extend(self.listed_mut(market)?.state.apply_borrow(plan));

        tracing::debug!(borrower = %borrower, market = %market, amount = %borrow_amount, "Borrow");
        Ok(events)
    }

    /// Repay on behalf of `borrower`; `U256::MAX` repays the whole balance
    pub fn repay_borrow(
        &mut self,
        payer: &AccountId,
        borrower: &AccountId,
        market: &MarketId,
        repay_amount: U256,
        now: u64,
    ) -> JoeResult<Vec<JoeEvent>> {
        self.repay_borrow_allowed(market)?.into_result()?;
        let plan = self
            .listed(market)?
            .state
            .prepare_repay(payer, borrower, repay_amount, now)
            .map_err(market_err(market))?;

        tracing::debug!(payer = %payer, borrower = %borrower, market = %market, amount = %plan.repay_amount, "Repay");
        Ok(self.listed_mut(market)?.state.apply_repay(plan))
    }

    pub fn transfer(
        &mut self,
        src: &AccountId,
        dst: &AccountId,
        market: &MarketId,
        tokens: U256,
        prices: &impl PriceSource,
    ) -> JoeResult<Vec<JoeEvent>> {
        let dst_is_member = self.check_membership(dst, market);
        let plan = self
            .listed(market)?
            .state
            .prepare_transfer(src, dst, tokens, dst_is_member)
            .map_err(market_err(market))?;
        self.transfer_allowed(market, src, plan.collateral_tokens_removed(), prices)?
            .into_result()?;

        tracing::debug!(src = %src, dst = %dst, market = %market, tokens = %tokens, "Transfer");
        Ok(self.listed_mut(market)?.state.apply_transfer(plan))
    }

    /// Settle a flashloan: `amount` was lent out and `repaid` came back
    pub fn flashloan(
        &mut self,
        receiver: &AccountId,
        market: &MarketId,
        amount: U256,
        repaid: U256,
        now: u64,
    ) -> JoeResult<Vec<JoeEvent>> {
        self.flashloan_allowed(market, receiver, amount)?.into_result()?;
        let plan = self
            .listed(market)?
            .state
            .prepare_flashloan(receiver, amount, repaid, now)
            .map_err(market_err(market))?;

        tracing::debug!(receiver = %receiver, market = %market, fee = %plan.total_fee, "Flashloan settled");
        Ok(self.listed_mut(market)?.state.apply_flashloan(plan))
    }
}
