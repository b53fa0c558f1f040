//! Collateral registration for collateral-cap markets
//!
//! Only registered tokens count toward an account's borrowing power.
//! Registration is bounded by `collateral_cap` (zero means unlimited).

use bankerjoe_core::math::{add, sub};
use bankerjoe_core::{AccountId, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MarketError, MarketResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLedger {
    collateral_cap: U256,
    total_collateral_tokens: U256,
    account_collateral_tokens: BTreeMap<AccountId, U256>,
}

/// New collateral totals, computed but not yet committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollateralPlan {
    pub total_collateral_tokens: U256,
    pub accounts: Vec<(AccountId, U256)>,
}

impl CollateralPlan {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CollateralLedger {
    pub fn new(collateral_cap: U256) -> Self {
        Self {
            collateral_cap,
            ..Self::default()
        }
    }

    pub fn collateral_cap(&self) -> U256 {
        self.collateral_cap
    }

    pub fn total_collateral_tokens(&self) -> U256 {
        self.total_collateral_tokens
    }

    pub fn tokens_of(&self, account: &AccountId) -> U256 {
        self.account_collateral_tokens
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set_cap(&mut self, collateral_cap: U256) {
        self.collateral_cap = collateral_cap;
    }

    pub(crate) fn draft(&self) -> CollateralDraft<'_> {
        CollateralDraft {
            ledger: self,
            total: self.total_collateral_tokens,
            changes: BTreeMap::new(),
        }
    }

    pub(crate) fn apply(&mut self, plan: &CollateralPlan) {
        self.total_collateral_tokens = plan.total_collateral_tokens;
        for (account, tokens) in &plan.accounts {
            if tokens.is_zero() {
                self.account_collateral_tokens.remove(account);
            } else {
                self.account_collateral_tokens.insert(account.clone(), *tokens);
            }
        }
    }
}

/// Working copy used while preparing a ledger operation
pub(crate) struct CollateralDraft<'a> {
    ledger: &'a CollateralLedger,
    total: U256,
    changes: BTreeMap<AccountId, U256>,
}

impl CollateralDraft<'_> {
    pub(crate) fn tokens_of(&self, account: &AccountId) -> U256 {
        self.changes
            .get(account)
            .copied()
            .unwrap_or_else(|| self.ledger.tokens_of(account))
    }

    fn room(&self) -> U256 {
        if self.ledger.collateral_cap.is_zero() {
            U256::MAX
        } else {
            self.ledger.collateral_cap.saturating_sub(self.total)
        }
    }

    /// Register up to `amount` tokens, returns how many fit under the cap
    pub(crate) fn increase(&mut self, account: &AccountId, amount: U256) -> MarketResult<U256> {
        let registered = amount.min(self.room());
        if registered.is_zero() {
            return Ok(registered);
        }
        let current = self.tokens_of(account);
        self.changes.insert(account.clone(), add(current, registered)?);
        self.total = add(self.total, registered)?;
        Ok(registered)
    }

    pub(crate) fn decrease(&mut self, account: &AccountId, amount: U256) -> MarketResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let current = self.tokens_of(account);
        if current < amount {
            return Err(MarketError::InsufficientTokens {
                account: account.to_string(),
                available: current,
                required: amount,
            });
        }
        self.changes.insert(account.clone(), current - amount);
        self.total = sub(self.total, amount)?;
        Ok(())
    }

    /// Move registered tokens between accounts; the total is unchanged
    pub(crate) fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: U256) -> MarketResult<()> {
        self.decrease(from, amount)?;
        let current = self.tokens_of(to);
        self.changes.insert(to.clone(), add(current, amount)?);
        self.total = add(self.total, amount)?;
        Ok(())
    }

    pub(crate) fn finish(self) -> CollateralPlan {
        CollateralPlan {
            total_collateral_tokens: self.total,
            accounts: self.changes.into_iter().collect(),
        }
    }
}
