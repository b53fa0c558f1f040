//! Token and borrow ledger operations
//!
//! Every operation is split in two: `prepare_*` validates and computes the
//! post-operation values without touching the market, `apply_*` writes them
//! and returns the resulting events. A plan must be applied to the market it
//! was prepared on, with no other mutation in between.

use bankerjoe_core::math::{add, div, mul, sub};
use bankerjoe_core::{AccountId, Exp, U256, EXP_SCALE};
use bankerjoe_events::JoeEvent;

use crate::collateral::CollateralPlan;
use crate::error::{MarketError, MarketResult};
use crate::market::{BorrowSnapshot, Market, MarketKind};

const BIPS_SCALE: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintPlan {
    pub minter: AccountId,
    pub mint_amount: U256,
    pub mint_tokens: U256,
    cash: U256,
    total_supply: U256,
    account_tokens: U256,
    collateral: Option<CollateralPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemPlan {
    pub redeemer: AccountId,
    pub redeem_tokens: U256,
    pub redeem_amount: U256,
    /// Part of `redeem_tokens` that was counted as collateral
    pub collateral_tokens_removed: U256,
    cash: U256,
    total_supply: U256,
    account_tokens: U256,
    collateral: Option<CollateralPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowPlan {
    pub borrower: AccountId,
    pub borrow_amount: U256,
    pub account_borrows: U256,
    pub total_borrows: U256,
    cash: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayPlan {
    pub payer: AccountId,
    pub borrower: AccountId,
    /// Amount actually repaid (resolved when the request was `U256::MAX`)
    pub repay_amount: U256,
    pub account_borrows: U256,
    pub total_borrows: U256,
    cash: U256,
}

/// Token movement between two accounts of one market
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenMove {
    from: AccountId,
    to: AccountId,
    tokens: U256,
    collateral_tokens_removed: U256,
    from_tokens: U256,
    to_tokens: U256,
    collateral: Option<CollateralPlan>,
}

/// Which tokens a move takes from the sender's collateral
#[derive(Debug, Clone, Copy)]
enum CollateralRule {
    /// Unregistered tokens go first; the receiver registers only as a member
    BufferFirst { to_is_member: bool },
    /// Registered tokens only, kept registered for the receiver
    Registered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    inner: TokenMove,
}

impl TransferPlan {
    pub fn from(&self) -> &AccountId {
        &self.inner.from
    }

    pub fn to(&self) -> &AccountId {
        &self.inner.to
    }

    pub fn tokens(&self) -> U256 {
        self.inner.tokens
    }

    pub fn collateral_tokens_removed(&self) -> U256 {
        self.inner.collateral_tokens_removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeizePlan {
    inner: TokenMove,
}

impl SeizePlan {
    pub fn liquidator(&self) -> &AccountId {
        &self.inner.to
    }

    pub fn borrower(&self) -> &AccountId {
        &self.inner.from
    }

    pub fn seize_tokens(&self) -> U256 {
        self.inner.tokens
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashloanPlan {
    pub receiver: AccountId,
    pub amount: U256,
    pub total_fee: U256,
    pub reserves_fee: U256,
    cash: U256,
    total_reserves: U256,
}

impl Market {
    fn ensure_cash(&self, required: U256) -> MarketResult<()> {
        if self.cash < required {
            return Err(MarketError::InsufficientCash {
                available: self.cash,
                required,
            });
        }
        Ok(())
    }

    /// Flashloan fee for `amount`: `amount * flash_fee_bips / 10_000`
    pub fn flash_fee(&self, amount: U256) -> MarketResult<U256> {
        Ok(div(
            mul(amount, U256::from(self.flash_fee_bips))?,
            U256::from(BIPS_SCALE),
        )?)
    }

    /// Underlying that `tokens` redeem for at the stored exchange rate
    pub fn tokens_to_underlying(&self, tokens: U256) -> MarketResult<U256> {
        Ok(self.exchange_rate_stored()?.mul_scalar_truncate(tokens)?)
    }

    fn collateral_plan_event(&self, plan: &Option<CollateralPlan>) -> Vec<JoeEvent> {
        plan.iter()
            .flat_map(|plan| plan.accounts.iter())
            .map(|(account, tokens)| JoeEvent::UserCollateralChanged {
                market: self.id.clone(),
                account: account.clone(),
                collateral_tokens: *tokens,
            })
            .collect()
    }

    fn apply_collateral(&mut self, plan: &Option<CollateralPlan>) {
        if let (MarketKind::CollateralCap(ledger), Some(plan)) = (&mut self.kind, plan) {
            ledger.apply(plan);
        }
    }

    fn set_token_balance(&mut self, account: &AccountId, tokens: U256) {
        if tokens.is_zero() {
            self.account_tokens.remove(account);
        } else {
            self.account_tokens.insert(account.clone(), tokens);
        }
    }

    fn set_borrow_balance(&mut self, account: &AccountId, principal: U256) {
        if principal.is_zero() {
            self.account_borrows.remove(account);
        } else {
            self.account_borrows.insert(
                account.clone(),
                BorrowSnapshot {
                    principal,
                    interest_index: self.borrow_index,
                },
            );
        }
    }

    // === Mint ===

    /// Supply `mint_amount` underlying for `amount * 1e18 / exchange_rate` tokens.
    ///
    /// On collateral-cap markets the minted tokens are registered as
    /// collateral when the minter is a member, up to the cap.
    pub fn prepare_mint(
        &self,
        minter: &AccountId,
        mint_amount: U256,
        minter_is_member: bool,
        now: u64,
    ) -> MarketResult<MintPlan> {
        self.ensure_fresh(now)?;

        let exchange_rate = self.exchange_rate_stored()?;
        let mint_tokens = div(mul(mint_amount, EXP_SCALE)?, exchange_rate.mantissa())?;

        let collateral = match &self.kind {
            MarketKind::CollateralCap(ledger) if minter_is_member => {
                let mut draft = ledger.draft();
                draft.increase(minter, mint_tokens)?;
                Some(draft.finish())
            }
            _ => None,
        };

        Ok(MintPlan {
            minter: minter.clone(),
            mint_amount,
            mint_tokens,
            cash: add(self.cash, mint_amount)?,
            total_supply: add(self.total_supply, mint_tokens)?,
            account_tokens: add(self.token_balance(minter), mint_tokens)?,
            collateral,
        })
    }

    pub fn apply_mint(&mut self, plan: MintPlan) -> Vec<JoeEvent> {
        self.cash = plan.cash;
        self.total_supply = plan.total_supply;
        self.set_token_balance(&plan.minter, plan.account_tokens);
        self.apply_collateral(&plan.collateral);

        let mut events = vec![JoeEvent::Mint {
            market: self.id.clone(),
            minter: plan.minter,
            mint_amount: plan.mint_amount,
            mint_tokens: plan.mint_tokens,
        }];
        events.extend(self.collateral_plan_event(&plan.collateral));
        events
    }

    // === Redeem ===

    /// Redeem a number of market tokens
    pub fn prepare_redeem(
        &self,
        redeemer: &AccountId,
        redeem_tokens: U256,
        now: u64,
    ) -> MarketResult<RedeemPlan> {
        self.ensure_fresh(now)?;
        let redeem_amount = self.tokens_to_underlying(redeem_tokens)?;
        self.redeem_plan(redeemer, redeem_tokens, redeem_amount)
    }

    /// Redeem tokens worth `redeem_amount` underlying, rounding the token
    /// count up so the redeemer never receives more than they burn.
    pub fn prepare_redeem_underlying(
        &self,
        redeemer: &AccountId,
        redeem_amount: U256,
        now: u64,
    ) -> MarketResult<RedeemPlan> {
        self.ensure_fresh(now)?;
        let rate = self.exchange_rate_stored()?.mantissa();
        let scaled = mul(redeem_amount, EXP_SCALE)?;
        let mut redeem_tokens = div(scaled, rate)?;
        if !(scaled % rate).is_zero() {
            redeem_tokens = add(redeem_tokens, U256::one())?;
        }
        self.redeem_plan(redeemer, redeem_tokens, redeem_amount)
    }

    fn redeem_plan(
        &self,
        redeemer: &AccountId,
        redeem_tokens: U256,
        redeem_amount: U256,
    ) -> MarketResult<RedeemPlan> {
        self.ensure_cash(redeem_amount)?;
        let account_tokens = self.checked_token_balance_sub(redeemer, redeem_tokens)?;

        let (collateral_tokens_removed, collateral) = match &self.kind {
            MarketKind::CollateralCap(ledger) => {
                let registered = ledger.tokens_of(redeemer);
                let buffer = self.token_balance(redeemer).saturating_sub(registered);
                let removed = redeem_tokens.saturating_sub(buffer);
                let mut draft = ledger.draft();
                draft.decrease(redeemer, removed)?;
                (removed, Some(draft.finish()).filter(|plan| !plan.is_empty()))
            }
            MarketKind::Vanilla | MarketKind::WrappedNative => (redeem_tokens, None),
        };

        Ok(RedeemPlan {
            redeemer: redeemer.clone(),
            redeem_tokens,
            redeem_amount,
            collateral_tokens_removed,
            cash: sub(self.cash, redeem_amount)?,
            total_supply: sub(self.total_supply, redeem_tokens)?,
            account_tokens,
            collateral,
        })
    }

    pub fn apply_redeem(&mut self, plan: RedeemPlan) -> Vec<JoeEvent> {
        self.cash = plan.cash;
        self.total_supply = plan.total_supply;
        self.set_token_balance(&plan.redeemer, plan.account_tokens);
        self.apply_collateral(&plan.collateral);

        let mut events = vec![JoeEvent::Redeem {
            market: self.id.clone(),
            redeemer: plan.redeemer,
            redeem_amount: plan.redeem_amount,
            redeem_tokens: plan.redeem_tokens,
        }];
        events.extend(self.collateral_plan_event(&plan.collateral));
        events
    }

    // === Borrow / repay ===

    pub fn prepare_borrow(
        &self,
        borrower: &AccountId,
        borrow_amount: U256,
        now: u64,
    ) -> MarketResult<BorrowPlan> {
        self.ensure_fresh(now)?;
        self.ensure_cash(borrow_amount)?;

        let account_borrows = add(self.borrow_balance_stored(borrower)?, borrow_amount)?;
        Ok(BorrowPlan {
            borrower: borrower.clone(),
            borrow_amount,
            account_borrows,
            total_borrows: add(self.total_borrows, borrow_amount)?,
            cash: sub(self.cash, borrow_amount)?,
        })
    }

    pub fn apply_borrow(&mut self, plan: BorrowPlan) -> Vec<JoeEvent> {
        self.cash = plan.cash;
        self.total_borrows = plan.total_borrows;
        self.set_borrow_balance(&plan.borrower, plan.account_borrows);

        vec![JoeEvent::Borrow {
            market: self.id.clone(),
            borrower: plan.borrower,
            borrow_amount: plan.borrow_amount,
            account_borrows: plan.account_borrows,
            total_borrows: plan.total_borrows,
        }]
    }

    /// Repay `repay_amount` of `borrower`'s debt; `U256::MAX` repays all of it.
    ///
    /// Repaying more than is owed fails with `Underflow`.
    pub fn prepare_repay(
        &self,
        payer: &AccountId,
        borrower: &AccountId,
        repay_amount: U256,
        now: u64,
    ) -> MarketResult<RepayPlan> {
        self.ensure_fresh(now)?;

        let owed = self.borrow_balance_stored(borrower)?;
        let repay_amount = if repay_amount == U256::MAX {
            owed
        } else {
            repay_amount
        };

        Ok(RepayPlan {
            payer: payer.clone(),
            borrower: borrower.clone(),
            repay_amount,
            account_borrows: sub(owed, repay_amount)?,
            total_borrows: sub(self.total_borrows, repay_amount)?,
            cash: add(self.cash, repay_amount)?,
        })
    }

    pub fn apply_repay(&mut self, plan: RepayPlan) -> Vec<JoeEvent> {
        self.cash = plan.cash;
        self.total_borrows = plan.total_borrows;
        self.set_borrow_balance(&plan.borrower, plan.account_borrows);

        vec![JoeEvent::RepayBorrow {
            market: self.id.clone(),
            payer: plan.payer,
            borrower: plan.borrower,
            repay_amount: plan.repay_amount,
            account_borrows: plan.account_borrows,
            total_borrows: plan.total_borrows,
        }]
    }

    // === Transfer / seize ===

    fn token_move(
        &self,
        from: &AccountId,
        to: &AccountId,
        tokens: U256,
        rule: CollateralRule,
    ) -> MarketResult<TokenMove> {
        if from == to {
            return Err(MarketError::InvalidAccountPair);
        }

        let from_tokens = self.checked_token_balance_sub(from, tokens)?;
        let to_tokens = add(self.token_balance(to), tokens)?;

        let (collateral_tokens_removed, collateral) = match (&self.kind, rule) {
            (MarketKind::CollateralCap(ledger), CollateralRule::BufferFirst { to_is_member }) => {
                let registered = ledger.tokens_of(from);
                let buffer = self.token_balance(from).saturating_sub(registered);
                let removed = tokens.saturating_sub(buffer);

                let mut draft = ledger.draft();
                draft.decrease(from, removed)?;
                if to_is_member {
                    draft.increase(to, removed)?;
                }
                (removed, Some(draft.finish()).filter(|plan| !plan.is_empty()))
            }
            (MarketKind::CollateralCap(ledger), CollateralRule::Registered) => {
                let mut draft = ledger.draft();
                draft.transfer(from, to, tokens)?;
                (tokens, Some(draft.finish()).filter(|plan| !plan.is_empty()))
            }
            (MarketKind::Vanilla | MarketKind::WrappedNative, _) => (tokens, None),
        };

        Ok(TokenMove {
            from: from.clone(),
            to: to.clone(),
            tokens,
            collateral_tokens_removed,
            from_tokens,
            to_tokens,
            collateral,
        })
    }

    fn apply_token_move(&mut self, inner: &TokenMove) -> Vec<JoeEvent> {
        self.set_token_balance(&inner.from, inner.from_tokens);
        self.set_token_balance(&inner.to, inner.to_tokens);
        self.apply_collateral(&inner.collateral);

        let mut events = vec![JoeEvent::Transfer {
            market: self.id.clone(),
            from: inner.from.clone(),
            to: inner.to.clone(),
            tokens: inner.tokens,
        }];
        events.extend(self.collateral_plan_event(&inner.collateral));
        events
    }

    /// Move tokens between accounts. Does not depend on accrual state.
    pub fn prepare_transfer(
        &self,
        src: &AccountId,
        dst: &AccountId,
        tokens: U256,
        dst_is_member: bool,
    ) -> MarketResult<TransferPlan> {
        let rule = CollateralRule::BufferFirst {
            to_is_member: dst_is_member,
        };
        Ok(TransferPlan {
            inner: self.token_move(src, dst, tokens, rule)?,
        })
    }

    pub fn apply_transfer(&mut self, plan: TransferPlan) -> Vec<JoeEvent> {
        self.apply_token_move(&plan.inner)
    }

    /// Move seized collateral from `borrower` to `liquidator`.
    ///
    /// On collateral-cap markets only registered tokens can be seized, and
    /// they stay registered on the liquidator's side.
    pub fn prepare_seize(
        &self,
        liquidator: &AccountId,
        borrower: &AccountId,
        seize_tokens: U256,
        now: u64,
    ) -> MarketResult<SeizePlan> {
        self.ensure_fresh(now)?;
        Ok(SeizePlan {
            inner: self.token_move(borrower, liquidator, seize_tokens, CollateralRule::Registered)?,
        })
    }

    pub fn apply_seize(&mut self, plan: SeizePlan) -> Vec<JoeEvent> {
        self.apply_token_move(&plan.inner)
    }

    // === Flashloan ===

    /// Settle a flashloan of `amount` for which the receiver paid back `repaid`.
    ///
    /// The fee stays in the market as cash; the reserve-factor share of it is
    /// added to reserves.
    pub fn prepare_flashloan(
        &self,
        receiver: &AccountId,
        amount: U256,
        repaid: U256,
        now: u64,
    ) -> MarketResult<FlashloanPlan> {
        self.ensure_fresh(now)?;
        self.ensure_cash(amount)?;

        let total_fee = self.flash_fee(amount)?;
        let required = add(amount, total_fee)?;
        if repaid < required {
            return Err(MarketError::InsufficientFlashloanRepay { required, repaid });
        }

        let reserves_fee = self.reserve_factor.mul_scalar_truncate(total_fee)?;
        Ok(FlashloanPlan {
            receiver: receiver.clone(),
            amount,
            total_fee,
            reserves_fee,
            cash: add(self.cash, total_fee)?,
            total_reserves: add(self.total_reserves, reserves_fee)?,
        })
    }

    pub fn apply_flashloan(&mut self, plan: FlashloanPlan) -> Vec<JoeEvent> {
        self.cash = plan.cash;
        self.total_reserves = plan.total_reserves;

        vec![JoeEvent::Flashloan {
            market: self.id.clone(),
            receiver: plan.receiver,
            amount: plan.amount,
            total_fee: plan.total_fee,
            reserves_fee: plan.reserves_fee,
        }]
    }

    // === Collateral registration ===

    /// Register the account's unregistered tokens as collateral, bounded by
    /// the cap. `None` for markets without a collateral ledger.
    pub fn prepare_register_collateral(&self, account: &AccountId) -> MarketResult<Option<CollateralPlan>> {
        let MarketKind::CollateralCap(ledger) = &self.kind else {
            return Ok(None);
        };
        let unregistered = self
            .token_balance(account)
            .saturating_sub(ledger.tokens_of(account));
        let mut draft = ledger.draft();
        draft.increase(account, unregistered)?;
        Ok(Some(draft.finish()).filter(|plan| !plan.is_empty()))
    }

    /// Unregister all of the account's collateral tokens.
    ///
    /// Returns the plan and the number of tokens it removes.
    pub fn prepare_unregister_collateral(
        &self,
        account: &AccountId,
    ) -> MarketResult<Option<(CollateralPlan, U256)>> {
        let MarketKind::CollateralCap(ledger) = &self.kind else {
            return Ok(None);
        };
        let registered = ledger.tokens_of(account);
        if registered.is_zero() {
            return Ok(None);
        }
        let mut draft = ledger.draft();
        draft.decrease(account, registered)?;
        Ok(Some((draft.finish(), registered)))
    }

    pub fn apply_collateral_plan(&mut self, plan: CollateralPlan) -> Vec<JoeEvent> {
        let plan = Some(plan);
        self.apply_collateral(&plan);
        self.collateral_plan_event(&plan)
    }

    /// Change the collateral cap of a collateral-cap market
    pub fn set_collateral_cap(&mut self, collateral_cap: U256) -> MarketResult<()> {
        match &mut self.kind {
            MarketKind::CollateralCap(ledger) => {
                ledger.set_cap(collateral_cap);
                tracing::info!(market = %self.id, cap = %collateral_cap, "Collateral cap updated");
                Ok(())
            }
            _ => Err(MarketError::InvalidParameter(format!(
                "market {} has no collateral cap",
                self.id
            ))),
        }
    }

    // === Reserves ===

    pub fn add_reserves(
        &mut self,
        benefactor: &AccountId,
        add_amount: U256,
        now: u64,
    ) -> MarketResult<JoeEvent> {
        self.ensure_fresh(now)?;
        let cash = add(self.cash, add_amount)?;
        let total_reserves = add(self.total_reserves, add_amount)?;

        self.cash = cash;
        self.total_reserves = total_reserves;
        Ok(JoeEvent::ReservesAdded {
            market: self.id.clone(),
            benefactor: benefactor.clone(),
            add_amount,
            total_reserves,
        })
    }

    pub fn reduce_reserves(
        &mut self,
        admin: &AccountId,
        reduce_amount: U256,
        now: u64,
    ) -> MarketResult<JoeEvent> {
        self.ensure_fresh(now)?;
        self.ensure_cash(reduce_amount)?;
        let total_reserves = sub(self.total_reserves, reduce_amount)?;
        let cash = sub(self.cash, reduce_amount)?;

        self.cash = cash;
        self.total_reserves = total_reserves;
        Ok(JoeEvent::ReservesReduced {
            market: self.id.clone(),
            admin: admin.clone(),
            reduce_amount,
            total_reserves,
        })
    }

    pub fn set_reserve_factor(&mut self, new_reserve_factor: Exp, now: u64) -> MarketResult<JoeEvent> {
        self.ensure_fresh(now)?;
        if new_reserve_factor > Exp::ONE {
            return Err(MarketError::InvalidParameter(format!(
                "reserve factor {} above 1",
                new_reserve_factor
            )));
        }

        let old_reserve_factor = self.reserve_factor;
        self.reserve_factor = new_reserve_factor;
        Ok(JoeEvent::NewReserveFactor {
            market: self.id.clone(),
            old_reserve_factor,
            new_reserve_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MarketVersion;
    use bankerjoe_core::MarketId;
    use bankerjoe_rates::{JumpRateModel, SECONDS_PER_YEAR};

    const NOW: u64 = 100;

    fn units(n: u64) -> U256 {
        U256::from(n) * EXP_SCALE
    }

    fn alice() -> AccountId {
        AccountId::new("ALICE")
    }

    fn bob() -> AccountId {
        AccountId::new("BOB")
    }

    fn market(version: MarketVersion) -> Market {
        let model = JumpRateModel::from_yearly(
            Exp::ZERO,
            Exp::from_ratio(U256::from(2), U256::from(10)).unwrap(),
            Exp::from_scalar(U256::from(2)).unwrap(),
            Exp::from_ratio(U256::from(8), U256::from(10)).unwrap(),
            Exp::ONE,
            SECONDS_PER_YEAR,
        )
        .unwrap();
        Market::new(MarketId::new("jUSDC"), version, model.into(), Exp::ONE, NOW).unwrap()
    }

    fn mint(market: &mut Market, account: &AccountId, amount: U256, member: bool) {
        let plan = market.prepare_mint(account, amount, member, NOW).unwrap();
        market.apply_mint(plan);
    }

    #[test]
    fn test_mint_updates_supply_and_cash() {
        let mut market = market(MarketVersion::Vanilla);
        let plan = market.prepare_mint(&alice(), units(100), false, NOW).unwrap();
        assert_eq!(plan.mint_tokens, units(100));

        let events = market.apply_mint(plan);
        assert_eq!(events.len(), 1);
        assert_eq!(market.cash(), units(100));
        assert_eq!(market.total_supply(), units(100));
        assert_eq!(market.token_balance(&alice()), units(100));
    }

    #[test]
    fn test_ledger_ops_require_fresh_market() {
        let market = market(MarketVersion::Vanilla);
        let result = market.prepare_mint(&alice(), units(1), false, NOW + 1);
        assert_eq!(
            result,
            Err(MarketError::NotFresh {
                accrual_timestamp: NOW,
                now: NOW + 1
            })
        );
    }

    #[test]
    fn test_collateral_cap_mint_registration() {
        let mut market = market(MarketVersion::CollateralCap);
        market.set_collateral_cap(units(60)).unwrap();

        mint(&mut market, &alice(), units(100), true);
        assert_eq!(market.collateral_tokens(&alice()), units(60));
        assert_eq!(market.total_collateral_tokens(), Some(units(60)));

        mint(&mut market, &bob(), units(10), false);
        assert!(market.collateral_tokens(&bob()).is_zero());
    }

    #[test]
    fn test_redeem_consumes_buffer_first() {
        let mut market = market(MarketVersion::CollateralCap);
        market.set_collateral_cap(units(60)).unwrap();
        mint(&mut market, &alice(), units(100), true);

        // 40 buffer tokens, then 10 from collateral
        let plan = market.prepare_redeem(&alice(), units(50), NOW).unwrap();
        assert_eq!(plan.collateral_tokens_removed, units(10));
        assert_eq!(plan.redeem_amount, units(50));

        market.apply_redeem(plan);
        assert_eq!(market.token_balance(&alice()), units(50));
        assert_eq!(market.collateral_tokens(&alice()), units(50));
        assert_eq!(market.cash(), units(50));
    }

    #[test]
    fn test_vanilla_redeem_counts_all_tokens() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(100), true);
        let plan = market.prepare_redeem(&alice(), units(30), NOW).unwrap();
        assert_eq!(plan.collateral_tokens_removed, units(30));
    }

    #[test]
    fn test_redeem_underlying_rounds_tokens_up() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(100), false);
        // (100 + 50) / 100 = 1.5
        market.total_borrows = units(50);

        let plan = market.prepare_redeem_underlying(&alice(), U256::from(1), NOW).unwrap();
        assert_eq!(plan.redeem_tokens, U256::from(1));

        let plan = market.prepare_redeem_underlying(&alice(), U256::from(3), NOW).unwrap();
        assert_eq!(plan.redeem_tokens, U256::from(2));
    }

    #[test]
    fn test_redeem_insufficient_cash() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(100), false);
        market.cash = units(10);
        let result = market.prepare_redeem_underlying(&alice(), units(20), NOW);
        assert!(matches!(result, Err(MarketError::InsufficientCash { .. })));
    }

    #[test]
    fn test_borrow_then_repay_all() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(100), false);

        let plan = market.prepare_borrow(&bob(), units(40), NOW).unwrap();
        market.apply_borrow(plan);
        assert_eq!(market.borrow_balance_stored(&bob()).unwrap(), units(40));
        assert_eq!(market.cash(), units(60));
        assert!(market.has_borrow(&bob()));

        let plan = market.prepare_repay(&bob(), &bob(), U256::MAX, NOW).unwrap();
        assert_eq!(plan.repay_amount, units(40));
        market.apply_repay(plan);
        assert!(!market.has_borrow(&bob()));
        assert!(market.total_borrows().is_zero());
        assert_eq!(market.cash(), units(100));
    }

    #[test]
    fn test_repay_above_debt_fails() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(100), false);
        let plan = market.prepare_borrow(&bob(), units(10), NOW).unwrap();
        market.apply_borrow(plan);

        let result = market.prepare_repay(&bob(), &bob(), units(11), NOW);
        assert!(matches!(result, Err(MarketError::Math(_))));
    }

    #[test]
    fn test_borrow_insufficient_cash() {
        let market = market(MarketVersion::Vanilla);
        let result = market.prepare_borrow(&bob(), units(1), NOW);
        assert!(matches!(result, Err(MarketError::InsufficientCash { .. })));
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(10), false);
        let result = market.prepare_transfer(&alice(), &alice(), units(1), false);
        assert_eq!(result, Err(MarketError::InvalidAccountPair));
    }

    #[test]
    fn test_seize_moves_collateral_to_liquidator() {
        let mut market = market(MarketVersion::CollateralCap);
        mint(&mut market, &alice(), units(100), true);

        let plan = market.prepare_seize(&bob(), &alice(), units(30), NOW).unwrap();
        market.apply_seize(plan);

        assert_eq!(market.token_balance(&bob()), units(30));
        assert_eq!(market.collateral_tokens(&bob()), units(30));
        assert_eq!(market.collateral_tokens(&alice()), units(70));
        assert_eq!(market.total_collateral_tokens(), Some(units(100)));
    }

    #[test]
    fn test_seize_skips_buffer_tokens() {
        let mut market = market(MarketVersion::CollateralCap);
        market.set_collateral_cap(units(60)).unwrap();
        // 60 registered, 40 buffer
        mint(&mut market, &alice(), units(100), true);

        let plan = market.prepare_seize(&bob(), &alice(), units(25), NOW).unwrap();
        assert_eq!(plan.seize_tokens(), units(25));
        market.apply_seize(plan);

        assert_eq!(market.token_balance(&alice()), units(75));
        assert_eq!(market.collateral_tokens(&alice()), units(35));
        assert_eq!(market.collateral_tokens(&bob()), units(25));
        assert_eq!(market.total_collateral_tokens(), Some(units(60)));

        let result = market.prepare_seize(&bob(), &alice(), units(36), NOW);
        assert!(matches!(result, Err(MarketError::InsufficientTokens { .. })));
    }

    #[test]
    fn test_flashloan_fee_split() {
        let mut market = market(MarketVersion::Vanilla)
            .with_reserve_factor(Exp::from_ratio(U256::from(1), U256::from(2)).unwrap())
            .unwrap();
        mint(&mut market, &alice(), units(10_000), false);

        // 8 bips of 1000 = 0.8
        let fee = market.flash_fee(units(1_000)).unwrap();
        assert_eq!(fee, U256::from(800_000_000_000_000_000u64));

        let short = market.prepare_flashloan(&bob(), units(1_000), units(1_000), NOW);
        assert!(matches!(short, Err(MarketError::InsufficientFlashloanRepay { .. })));

        let plan = market
            .prepare_flashloan(&bob(), units(1_000), units(1_000) + fee, NOW)
            .unwrap();
        market.apply_flashloan(plan);
        assert_eq!(market.cash(), units(10_000) + fee);
        assert_eq!(market.total_reserves(), fee / 2);
    }

    #[test]
    fn test_register_and_unregister_collateral() {
        let mut market = market(MarketVersion::CollateralCap);
        mint(&mut market, &alice(), units(100), false);
        assert!(market.collateral_tokens(&alice()).is_zero());

        let plan = market.prepare_register_collateral(&alice()).unwrap().unwrap();
        market.apply_collateral_plan(plan);
        assert_eq!(market.collateral_tokens(&alice()), units(100));

        let (plan, removed) = market.prepare_unregister_collateral(&alice()).unwrap().unwrap();
        assert_eq!(removed, units(100));
        market.apply_collateral_plan(plan);
        assert!(market.collateral_tokens(&alice()).is_zero());
    }

    #[test]
    fn test_vanilla_has_no_collateral_ledger() {
        let mut market = market(MarketVersion::Vanilla);
        mint(&mut market, &alice(), units(5), false);
        assert_eq!(market.prepare_register_collateral(&alice()).unwrap(), None);
        assert_eq!(market.collateral_tokens(&alice()), units(5));
        assert!(market.set_collateral_cap(units(1)).is_err());
    }

    #[test]
    fn test_reserves() {
        let mut market = market(MarketVersion::Vanilla);
        market.add_reserves(&alice(), units(10), NOW).unwrap();
        assert_eq!(market.total_reserves(), units(10));
        assert_eq!(market.cash(), units(10));

        let result = market.reduce_reserves(&alice(), units(11), NOW);
        assert!(matches!(result, Err(MarketError::InsufficientCash { .. })));

        market.reduce_reserves(&alice(), units(4), NOW).unwrap();
        assert_eq!(market.total_reserves(), units(6));
    }

    #[test]
    fn test_reserve_factor_bound() {
        let mut market = market(MarketVersion::Vanilla);
        let too_high = Exp::from_scalar(U256::from(2)).unwrap();
        assert!(market.set_reserve_factor(too_high, NOW).is_err());
        assert!(market.set_reserve_factor(Exp::ONE, NOW).is_ok());
    }
}
