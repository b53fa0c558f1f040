//! Engine events for persistence and pub/sub distribution

use bankerjoe_core::{AccountId, Exp, MarketId, U256};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Pausable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum Action {
    Mint,
    Borrow,
    Flashloan,
    Transfer,
    Seize,
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoeEvent {
    /// Interest was accrued on a market
    AccrueInterest {
        market: MarketId,
        cash_prior: U256,
        interest_accumulated: U256,
        borrow_index: U256,
        total_borrows: U256,
    },

    /// Underlying supplied in exchange for market tokens
    Mint {
        market: MarketId,
        minter: AccountId,
        mint_amount: U256,
        mint_tokens: U256,
    },

    /// Market tokens burned for underlying
    Redeem {
        market: MarketId,
        redeemer: AccountId,
        redeem_amount: U256,
        redeem_tokens: U256,
    },

    Borrow {
        market: MarketId,
        borrower: AccountId,
        borrow_amount: U256,
        account_borrows: U256,
        total_borrows: U256,
    },

    RepayBorrow {
        market: MarketId,
        payer: AccountId,
        borrower: AccountId,
        repay_amount: U256,
        account_borrows: U256,
        total_borrows: U256,
    },

    /// A shortfall account was liquidated
    LiquidateBorrow {
        liquidator: AccountId,
        borrower: AccountId,
        market_borrowed: MarketId,
        repay_amount: U256,
        market_collateral: MarketId,
        seize_tokens: U256,
    },

    /// Market tokens moved between accounts
    Transfer {
        market: MarketId,
        from: AccountId,
        to: AccountId,
        tokens: U256,
    },

    /// Collateral registration changed on a collateral-cap market
    UserCollateralChanged {
        market: MarketId,
        account: AccountId,
        collateral_tokens: U256,
    },

    Flashloan {
        market: MarketId,
        receiver: AccountId,
        amount: U256,
        total_fee: U256,
        reserves_fee: U256,
    },

    ReservesAdded {
        market: MarketId,
        benefactor: AccountId,
        add_amount: U256,
        total_reserves: U256,
    },

    ReservesReduced {
        market: MarketId,
        admin: AccountId,
        reduce_amount: U256,
        total_reserves: U256,
    },

    NewReserveFactor {
        market: MarketId,
        old_reserve_factor: Exp,
        new_reserve_factor: Exp,
    },

    MarketListed {
        market: MarketId,
    },

    MarketDelisted {
        market: MarketId,
    },

    MarketEntered {
        market: MarketId,
        account: AccountId,
    },

    MarketExited {
        market: MarketId,
        account: AccountId,
    },

    NewCollateralFactor {
        market: MarketId,
        old_collateral_factor: Exp,
        new_collateral_factor: Exp,
    },

    NewCloseFactor {
        old_close_factor: Exp,
        new_close_factor: Exp,
    },

    NewLiquidationIncentive {
        old_liquidation_incentive: Exp,
        new_liquidation_incentive: Exp,
    },

    NewSupplyCap {
        market: MarketId,
        new_supply_cap: U256,
    },

    NewBorrowCap {
        market: MarketId,
        new_borrow_cap: U256,
    },

    /// A per-market action was paused or unpaused
    MarketActionPaused {
        market: MarketId,
        action: Action,
        paused: bool,
    },

    /// A global action was paused or unpaused
    ActionPaused {
        action: Action,
        paused: bool,
    },

    CreditLimitChanged {
        account: AccountId,
        credit_limit: U256,
    },

    NewAdmin {
        old_admin: AccountId,
        new_admin: AccountId,
    },

    NewPauseGuardian {
        new_guardian: Option<AccountId>,
    },

    NewSupplyCapGuardian {
        new_guardian: Option<AccountId>,
    },

    NewBorrowCapGuardian {
        new_guardian: Option<AccountId>,
    },
}

impl JoeEvent {
    /// Market the event belongs to, if it is market-scoped
    pub fn market(&self) -> Option<&MarketId> {
        match self {
            JoeEvent::AccrueInterest { market, .. }
            | JoeEvent::Mint { market, .. }
            | JoeEvent::Redeem { market, .. }
            | JoeEvent::Borrow { market, .. }
            | JoeEvent::RepayBorrow { market, .. }
            | JoeEvent::Transfer { market, .. }
            | JoeEvent::UserCollateralChanged { market, .. }
            | JoeEvent::Flashloan { market, .. }
            | JoeEvent::ReservesAdded { market, .. }
            | JoeEvent::ReservesReduced { market, .. }
            | JoeEvent::NewReserveFactor { market, .. }
            | JoeEvent::MarketListed { market }
            | JoeEvent::MarketDelisted { market }
            | JoeEvent::MarketEntered { market, .. }
            | JoeEvent::MarketExited { market, .. }
            | JoeEvent::NewCollateralFactor { market, .. }
            | JoeEvent::NewSupplyCap { market, .. }
            | JoeEvent::NewBorrowCap { market, .. }
            | JoeEvent::MarketActionPaused { market, .. } => Some(market),
            JoeEvent::LiquidateBorrow { market_borrowed, .. } => Some(market_borrowed),
            JoeEvent::NewCloseFactor { .. }
            | JoeEvent::NewLiquidationIncentive { .. }
            | JoeEvent::ActionPaused { .. }
            | JoeEvent::CreditLimitChanged { .. }
            | JoeEvent::NewAdmin { .. }
            | JoeEvent::NewPauseGuardian { .. }
            | JoeEvent::NewSupplyCapGuardian { .. }
            | JoeEvent::NewBorrowCapGuardian { .. } => None,
        }
    }

    /// Short event name, e.g. for log fields
    pub fn name(&self) -> &'static str {
        match self {
            JoeEvent::AccrueInterest { .. } => "AccrueInterest",
            JoeEvent::Mint { .. } => "Mint",
            JoeEvent::Redeem { .. } => "Redeem",
            JoeEvent::Borrow { .. } => "Borrow",
            JoeEvent::RepayBorrow { .. } => "RepayBorrow",
            JoeEvent::LiquidateBorrow { .. } => "LiquidateBorrow",
            JoeEvent::Transfer { .. } => "Transfer",
            JoeEvent::UserCollateralChanged { .. } => "UserCollateralChanged",
            JoeEvent::Flashloan { .. } => "Flashloan",
            JoeEvent::ReservesAdded { .. } => "ReservesAdded",
            JoeEvent::ReservesReduced { .. } => "ReservesReduced",
            JoeEvent::NewReserveFactor { .. } => "NewReserveFactor",
            JoeEvent::MarketListed { .. } => "MarketListed",
            JoeEvent::MarketDelisted { .. } => "MarketDelisted",
            JoeEvent::MarketEntered { .. } => "MarketEntered",
            JoeEvent::MarketExited { .. } => "MarketExited",
            JoeEvent::NewCollateralFactor { .. } => "NewCollateralFactor",
            JoeEvent::NewCloseFactor { .. } => "NewCloseFactor",
            JoeEvent::NewLiquidationIncentive { .. } => "NewLiquidationIncentive",
            JoeEvent::NewSupplyCap { .. } => "NewSupplyCap",
            JoeEvent::NewBorrowCap { .. } => "NewBorrowCap",
            JoeEvent::MarketActionPaused { .. } => "MarketActionPaused",
            JoeEvent::ActionPaused { .. } => "ActionPaused",
            JoeEvent::CreditLimitChanged { .. } => "CreditLimitChanged",
            JoeEvent::NewAdmin { .. } => "NewAdmin",
            JoeEvent::NewPauseGuardian { .. } => "NewPauseGuardian",
            JoeEvent::NewSupplyCapGuardian { .. } => "NewSupplyCapGuardian",
            JoeEvent::NewBorrowCapGuardian { .. } => "NewBorrowCapGuardian",
        }
    }
}
