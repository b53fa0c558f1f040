//! Joetroller - market registry, memberships and admin configuration

use bankerjoe_core::{AccountId, Exp, MarketId, U256};
use bankerjoe_events::{Action, JoeEvent};
use bankerjoe_market::Market;
use bankerjoe_oracle::PriceSource;
use bankerjoe_rates::InterestRateModel;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ControllerConfig, CLOSE_FACTOR_MAX, CLOSE_FACTOR_MIN};
use crate::error::{market_err, JoeError, JoeResult, Rejection};

/// Risk configuration of one listed market
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketConfig {
    pub is_listed: bool,
    pub collateral_factor: Exp,
    /// Zero means unlimited
    pub supply_cap: U256,
    /// Zero means unlimited
    pub borrow_cap: U256,
    pub mint_paused: bool,
    pub borrow_paused: bool,
    pub flashloan_paused: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ListedMarket {
    pub(crate) state: Market,
    pub(crate) config: MarketConfig,
}

/// The risk controller.
///
/// Owns every market's state and the controller-level configuration. Queries
/// take `&self`; mutations take `&mut self` and either fully apply or leave
/// the controller untouched.
#[derive(Debug, Clone)]
pub struct Joetroller {
    pub(crate) admin: AccountId,
    pub(crate) pause_guardian: Option<AccountId>,
    pub(crate) supply_cap_guardian: Option<AccountId>,
    pub(crate) borrow_cap_guardian: Option<AccountId>,

    pub(crate) close_factor: Exp,
    pub(crate) liquidation_incentive: Exp,
    pub(crate) max_collateral_factor: Exp,

    pub(crate) transfer_paused: bool,
    pub(crate) seize_paused: bool,

    pub(crate) markets: BTreeMap<MarketId, ListedMarket>,
    pub(crate) account_assets: BTreeMap<AccountId, Vec<MarketId>>,
    pub(crate) credit_limits: BTreeMap<AccountId, U256>,
}

impl Joetroller {
    pub fn new(admin: AccountId, config: &ControllerConfig) -> JoeResult<Self> {
        config.validate()?;
        Ok(Self {
            admin,
            pause_guardian: None,
            supply_cap_guardian: None,
            borrow_cap_guardian: None,
            close_factor: config.close_factor_mantissa()?,
            liquidation_incentive: config.liquidation_incentive_mantissa()?,
            max_collateral_factor: config.max_collateral_factor_mantissa()?,
            transfer_paused: false,
            seize_paused: false,
            markets: BTreeMap::new(),
            account_assets: BTreeMap::new(),
            credit_limits: BTreeMap::new(),
        })
    }

    // === Access control ===

    pub(crate) fn require_admin(&self, caller: &AccountId, action: &'static str) -> JoeResult<()> {
        if *caller != self.admin {
            tracing::warn!(caller = %caller, action, "Unauthorized admin call");
            return Err(JoeError::Unauthorized {
                caller: caller.clone(),
                action,
            });
        }
        Ok(())
    }

    fn require_admin_or(
        &self,
        caller: &AccountId,
        guardian: &Option<AccountId>,
        action: &'static str,
    ) -> JoeResult<()> {
        if guardian.as_ref() == Some(caller) {
            return Ok(());
        }
        self.require_admin(caller, action)
    }

    /// Guardian may pause, only admin may unpause
    fn require_pause_rights(&self, caller: &AccountId, paused: bool, action: &'static str) -> JoeResult<()> {
        if paused {
            self.require_admin_or(caller, &self.pause_guardian, action)
        } else {
            self.require_admin(caller, action)
        }
    }

    // === Market lookup ===

    pub(crate) fn listed(&self, market: &MarketId) -> JoeResult<&ListedMarket> {
        self.markets
            .get(market)
            .filter(|m| m.config.is_listed)
            .ok_or_else(|| JoeError::MarketNotListed(market.clone()))
    }

    pub(crate) fn listed_mut(&mut self, market: &MarketId) -> JoeResult<&mut ListedMarket> {
        self.markets
            .get_mut(market)
            .filter(|m| m.config.is_listed)
            .ok_or_else(|| JoeError::MarketNotListed(market.clone()))
    }

    /// Read access to a market's state, listed or not
    pub fn market(&self, market: &MarketId) -> Option<&Market> {
        self.markets.get(market).map(|m| &m.state)
    }

    pub fn market_config(&self, market: &MarketId) -> Option<&MarketConfig> {
        self.markets.get(market).map(|m| &m.config)
    }

    pub fn is_listed(&self, market: &MarketId) -> bool {
        self.markets.get(market).is_some_and(|m| m.config.is_listed)
    }

    /// Listed markets in id order
    pub fn all_markets(&self) -> Vec<MarketId> {
        self.markets
            .iter()
            .filter(|(_, m)| m.config.is_listed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    // === Memberships ===

    pub fn assets_in(&self, account: &AccountId) -> &[MarketId] {
        self.account_assets
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn check_membership(&self, account: &AccountId, market: &MarketId) -> bool {
        self.assets_in(account).contains(market)
    }

    pub fn credit_limit(&self, account: &AccountId) -> Option<U256> {
        self.credit_limits.get(account).copied()
    }

    pub fn is_credit_account(&self, account: &AccountId) -> bool {
        self.credit_limits.contains_key(account)
    }

    /// Markets that matter for an account's liquidity: its memberships plus
    /// every market it still borrows in.
    pub(crate) fn relevant_markets(&self, account: &AccountId) -> BTreeSet<MarketId> {
        let mut markets: BTreeSet<MarketId> = self.assets_in(account).iter().cloned().collect();
        for (id, listed) in &self.markets {
            if listed.state.has_borrow(account) {
                markets.insert(id.clone());
            }
        }
        markets
    }

    /// Add `market` to the account's memberships, registering its tokens as
    /// collateral on collateral-cap markets. Already a member is a no-op.
    pub fn enter_market(&mut self, account: &AccountId, market: &MarketId) -> JoeResult<Vec<JoeEvent>> {
        let listed = self.listed(market)?;
        if self.check_membership(account, market) {
            return Ok(Vec::new());
        }

        let plan = listed
            .state
            .prepare_register_collateral(account)
            .map_err(market_err(market))?;

        let mut events = vec![JoeEvent::MarketEntered {
            market: market.clone(),
            account: account.clone(),
        }];
        if let Some(plan) = plan {
            let listed = self.listed_mut(market)?;
            events.extend(listed.state.apply_collateral_plan(plan));
        }
        self.account_assets
            .entry(account.clone())
            .or_default()
            .push(market.clone());

        tracing::debug!(account = %account, market = %market, "Market entered");
        Ok(events)
    }

    /// Enter several markets. Any unlisted market fails the whole call.
    pub fn enter_markets(&mut self, account: &AccountId, markets: &[MarketId]) -> JoeResult<Vec<JoeEvent>> {
        for market in markets {
            self.listed(market)?;
        }
        let mut events = Vec::new();
        for market in markets {
            events.extend(self.enter_market(account, market)?);
        }
        Ok(events)
    }

    /// Leave a market. Fails while the account borrows in it, or when
    /// removing its collateral would leave the account short.
    pub fn exit_market(
        &mut self,
        account: &AccountId,
        market: &MarketId,
        prices: &impl PriceSource,
    ) -> JoeResult<Vec<JoeEvent>> {
        let listed = self.listed(market)?;
        if !self.check_membership(account, market) {
            return Ok(Vec::new());
        }
        if listed.state.has_borrow(account) {
            tracing::warn!(account = %account, market = %market, "Exit rejected: outstanding borrow");
            return Err(JoeError::Rejected(Rejection::NonzeroBorrowBalance));
        }

        let collateral_tokens = listed.state.collateral_tokens(account);
        self.redeem_allowed(market, account, collateral_tokens, prices)?
            .into_result()?;

        let plan = listed
            .state
            .prepare_unregister_collateral(account)
            .map_err(market_err(market))?;

        let mut events = Vec::new();
        if let Some((plan, _)) = plan {
            let listed = self.listed_mut(market)?;
            events.extend(listed.state.apply_collateral_plan(plan));
        }
        if let Some(assets) = self.account_assets.get_mut(account) {
            assets.retain(|m| m != market);
            if assets.is_empty() {
                self.account_assets.remove(account);
            }
        }
        events.push(JoeEvent::MarketExited {
            market: market.clone(),
            account: account.clone(),
        });

        tracing::debug!(account = %account, market = %market, "Market exited");
        Ok(events)
    }

    // === Listing ===

    /// List a market. A delisted market may be listed again with new state.
    pub fn support_market(&mut self, caller: &AccountId, market: Market) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "support market")?;
        let id = market.id().clone();
        if self.is_listed(&id) {
            return Err(JoeError::MarketAlreadyListed(id));
        }

        self.markets.insert(
            id.clone(),
            ListedMarket {
                state: market,
                config: MarketConfig {
                    is_listed: true,
                    ..MarketConfig::default()
                },
            },
        );

        tracing::info!(market = %id, "Market listed");
        Ok(JoeEvent::MarketListed { market: id })
    }

    /// Delist an empty market. Its state is kept for reads.
    pub fn delist_market(&mut self, caller: &AccountId, market: &MarketId) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "delist market")?;
        let listed = self.listed_mut(market)?;
        if !listed.state.total_supply().is_zero() {
            return Err(JoeError::InvalidParameter(format!(
                "market {} still has supply {}",
                market,
                listed.state.total_supply()
            )));
        }
        listed.config.is_listed = false;

        for assets in self.account_assets.values_mut() {
            assets.retain(|m| m != market);
        }
        self.account_assets.retain(|_, assets| !assets.is_empty());

        tracing::info!(market = %market, "Market delisted");
        Ok(JoeEvent::MarketDelisted {
            market: market.clone(),
        })
    }

    // === Risk parameters ===

    pub fn set_collateral_factor(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        new_collateral_factor: Exp,
        prices: &impl PriceSource,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set collateral factor")?;
        self.listed(market)?;
        if new_collateral_factor > self.max_collateral_factor {
            return Err(JoeError::InvalidParameter(format!(
                "collateral factor {} above maximum {}",
                new_collateral_factor, self.max_collateral_factor
            )));
        }
        if !new_collateral_factor.is_zero() && prices.price_mantissa(market).is_none() {
            return Err(JoeError::PriceUnavailable(market.clone()));
        }

        let listed = self.listed_mut(market)?;
        let old_collateral_factor = listed.config.collateral_factor;
        listed.config.collateral_factor = new_collateral_factor;

        tracing::info!(
            market = %market,
            old = %old_collateral_factor,
            new = %new_collateral_factor,
            "Collateral factor updated"
        );
        Ok(JoeEvent::NewCollateralFactor {
            market: market.clone(),
            old_collateral_factor,
            new_collateral_factor,
        })
    }

    /// Give an account a credit limit; zero removes it
    pub fn set_credit_limit(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        credit_limit: U256,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set credit limit")?;
        if credit_limit.is_zero() {
            self.credit_limits.remove(account);
        } else {
            self.credit_limits.insert(account.clone(), credit_limit);
        }

        tracing::info!(account = %account, credit_limit = %credit_limit, "Credit limit updated");
        Ok(JoeEvent::CreditLimitChanged {
            account: account.clone(),
            credit_limit,
        })
    }

    pub fn set_close_factor(&mut self, caller: &AccountId, new_close_factor: Exp) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set close factor")?;
        let min = Exp::from_decimal(CLOSE_FACTOR_MIN)?;
        let max = Exp::from_decimal(CLOSE_FACTOR_MAX)?;
        if new_close_factor < min || new_close_factor > max {
            return Err(JoeError::InvalidParameter(format!(
                "close factor {} outside [{}, {}]",
                new_close_factor, min, max
            )));
        }

        let old_close_factor = self.close_factor;
        self.close_factor = new_close_factor;
        tracing::info!(old = %old_close_factor, new = %new_close_factor, "Close factor updated");
        Ok(JoeEvent::NewCloseFactor {
            old_close_factor,
            new_close_factor,
        })
    }

    pub fn set_liquidation_incentive(
        &mut self,
        caller: &AccountId,
        new_liquidation_incentive: Exp,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set liquidation incentive")?;
        if new_liquidation_incentive < Exp::ONE {
            return Err(JoeError::InvalidParameter(format!(
                "liquidation incentive {} below 1",
                new_liquidation_incentive
            )));
        }

        let old_liquidation_incentive = self.liquidation_incentive;
        self.liquidation_incentive = new_liquidation_incentive;
        tracing::info!(
            old = %old_liquidation_incentive,
            new = %new_liquidation_incentive,
            "Liquidation incentive updated"
        );
        Ok(JoeEvent::NewLiquidationIncentive {
            old_liquidation_incentive,
            new_liquidation_incentive,
        })
    }

    pub fn close_factor(&self) -> Exp {
        self.close_factor
    }

    pub fn liquidation_incentive(&self) -> Exp {
        self.liquidation_incentive
    }

    // === Caps ===

    pub fn set_market_supply_caps(
        &mut self,
        caller: &AccountId,
        caps: &[(MarketId, U256)],
    ) -> JoeResult<Vec<JoeEvent>> {
        self.require_admin_or(caller, &self.supply_cap_guardian, "set supply caps")?;
        for (market, _) in caps {
            self.listed(market)?;
        }

        let mut events = Vec::with_capacity(caps.len());
        for (market, cap) in caps {
            self.listed_mut(market)?.config.supply_cap = *cap;
            tracing::info!(market = %market, cap = %cap, "Supply cap updated");
            events.push(JoeEvent::NewSupplyCap {
                market: market.clone(),
                new_supply_cap: *cap,
            });
        }
        Ok(events)
    }

    pub fn set_market_borrow_caps(
        &mut self,
        caller: &AccountId,
        caps: &[(MarketId, U256)],
    ) -> JoeResult<Vec<JoeEvent>> {
        self.require_admin_or(caller, &self.borrow_cap_guardian, "set borrow caps")?;
        for (market, _) in caps {
            self.listed(market)?;
        }

        let mut events = Vec::with_capacity(caps.len());
        for (market, cap) in caps {
            self.listed_mut(market)?.config.borrow_cap = *cap;
            tracing::info!(market = %market, cap = %cap, "Borrow cap updated");
            events.push(JoeEvent::NewBorrowCap {
                market: market.clone(),
                new_borrow_cap: *cap,
            });
        }
        Ok(events)
    }

    // === Pauses ===

    fn set_market_paused(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        action: Action,
        paused: bool,
    ) -> JoeResult<JoeEvent> {
        self.require_pause_rights(caller, paused, "pause market action")?;
        let config = &mut self.listed_mut(market)?.config;
        match action {
            Action::Mint => config.mint_paused = paused,
            Action::Borrow => config.borrow_paused = paused,
            Action::Flashloan => config.flashloan_paused = paused,
            Action::Transfer | Action::Seize => {
                return Err(JoeError::InvalidParameter(format!(
                    "{} can only be paused globally",
                    action
                )))
            }
        }

        tracing::info!(market = %market, action = %action, paused, "Market action pause updated");
        Ok(JoeEvent::MarketActionPaused {
            market: market.clone(),
            action,
            paused,
        })
    }

    pub fn set_mint_paused(&mut self, caller: &AccountId, market: &MarketId, paused: bool) -> JoeResult<JoeEvent> {
        self.set_market_paused(caller, market, Action::Mint, paused)
    }

    pub fn set_borrow_paused(&mut self, caller: &AccountId, market: &MarketId, paused: bool) -> JoeResult<JoeEvent> {
        self.set_market_paused(caller, market, Action::Borrow, paused)
    }

    pub fn set_flashloan_paused(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        paused: bool,
    ) -> JoeResult<JoeEvent> {
        self.set_market_paused(caller, market, Action::Flashloan, paused)
    }

    pub fn set_transfer_paused(&mut self, caller: &AccountId, paused: bool) -> JoeResult<JoeEvent> {
        self.require_pause_rights(caller, paused, "pause transfers")?;
        self.transfer_paused = paused;
        tracing::info!(paused, "Transfer pause updated");
        Ok(JoeEvent::ActionPaused {
            action: Action::Transfer,
            paused,
        })
    }

    pub fn set_seize_paused(&mut self, caller: &AccountId, paused: bool) -> JoeResult<JoeEvent> {
        self.require_pause_rights(caller, paused, "pause seizing")?;
        self.seize_paused = paused;
        tracing::info!(paused, "Seize pause updated");
        Ok(JoeEvent::ActionPaused {
            action: Action::Seize,
            paused,
        })
    }

    pub fn transfer_paused(&self) -> bool {
        self.transfer_paused
    }

    pub fn seize_paused(&self) -> bool {
        self.seize_paused
    }

    // === Roles ===

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn set_admin(&mut self, caller: &AccountId, new_admin: AccountId) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set admin")?;
        let old_admin = std::mem::replace(&mut self.admin, new_admin.clone());
        tracing::info!(old = %old_admin, new = %new_admin, "Admin changed");
        Ok(JoeEvent::NewAdmin { old_admin, new_admin })
    }

    pub fn set_pause_guardian(
        &mut self,
        caller: &AccountId,
        new_guardian: Option<AccountId>,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set pause guardian")?;
        self.pause_guardian = new_guardian.clone();
        Ok(JoeEvent::NewPauseGuardian { new_guardian })
    }

    pub fn set_supply_cap_guardian(
        &mut self,
        caller: &AccountId,
        new_guardian: Option<AccountId>,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set supply cap guardian")?;
        self.supply_cap_guardian = new_guardian.clone();
        Ok(JoeEvent::NewSupplyCapGuardian { new_guardian })
    }

    pub fn set_borrow_cap_guardian(
        &mut self,
        caller: &AccountId,
        new_guardian: Option<AccountId>,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set borrow cap guardian")?;
        self.borrow_cap_guardian = new_guardian.clone();
        Ok(JoeEvent::NewBorrowCapGuardian { new_guardian })
    }

    // === Market administration ===

    pub fn set_reserve_factor(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        new_reserve_factor: Exp,
        now: u64,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "set reserve factor")?;
        self.listed_mut(market)?
            .state
            .set_reserve_factor(new_reserve_factor, now)
            .map_err(market_err(market))
    }

    pub fn set_collateral_cap(&mut self, caller: &AccountId, market: &MarketId, collateral_cap: U256) -> JoeResult<()> {
        self.require_admin(caller, "set collateral cap")?;
        self.listed_mut(market)?
            .state
            .set_collateral_cap(collateral_cap)
            .map_err(market_err(market))
    }

    pub fn set_interest_rate_model(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        rate_model: InterestRateModel,
        now: u64,
    ) -> JoeResult<()> {
        self.require_admin(caller, "set interest rate model")?;
        self.listed_mut(market)?
            .state
            .set_rate_model(rate_model, now)
            .map_err(market_err(market))?;
        tracing::info!(market = %market, "Interest rate model updated");
        Ok(())
    }

    pub fn add_reserves(
        &mut self,
        benefactor: &AccountId,
        market: &MarketId,
        add_amount: U256,
        now: u64,
    ) -> JoeResult<JoeEvent> {
        self.listed_mut(market)?
            .state
            .add_reserves(benefactor, add_amount, now)
            .map_err(market_err(market))
    }

    pub fn reduce_reserves(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        reduce_amount: U256,
        now: u64,
    ) -> JoeResult<JoeEvent> {
        self.require_admin(caller, "reduce reserves")?;
        let event = self
            .listed_mut(market)?
            .state
            .reduce_reserves(caller, reduce_amount, now)
            .map_err(market_err(market))?;
        tracing::info!(market = %market, amount = %reduce_amount, "Reserves reduced");
        Ok(event)
    }
}
