//! Market versions and listing parameters

use bankerjoe_core::U256;
use bankerjoe_rates::RateModelConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Market implementation variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MarketVersion {
    /// Plain ERC20-style market, full token balance counts as collateral
    Vanilla,
    /// Only registered tokens count as collateral, bounded by a cap
    CollateralCap,
    /// Native-asset market, same risk semantics as vanilla
    WrappedNative,
}

/// Parameters used to create a market before listing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    pub version: MarketVersion,

    pub rate_model: RateModelConfig,

    /// Fraction of interest set aside as reserves
    #[serde(default = "default_reserve_factor")]
    pub reserve_factor: Decimal,

    /// Exchange rate used while total supply is zero
    #[serde(default = "default_initial_exchange_rate")]
    pub initial_exchange_rate: Decimal,

    /// Maximum per-second borrow rate accepted during accrual
    #[serde(default = "default_borrow_rate_max_per_second")]
    pub borrow_rate_max_per_second: Decimal,

    /// Flashloan fee in basis points
    #[serde(default = "default_flash_fee_bips")]
    pub flash_fee_bips: u64,

    /// Collateral cap in market tokens (collateral-cap markets, 0 = unlimited)
    #[serde(default)]
    pub collateral_cap: U256,
}

impl MarketParams {
    /// Parameters with every optional field at its default
    pub fn new(version: MarketVersion, rate_model: RateModelConfig) -> Self {
        Self {
            version,
            rate_model,
            reserve_factor: default_reserve_factor(),
            initial_exchange_rate: default_initial_exchange_rate(),
            borrow_rate_max_per_second: default_borrow_rate_max_per_second(),
            flash_fee_bips: default_flash_fee_bips(),
            collateral_cap: U256::zero(),
        }
    }
}

fn default_reserve_factor() -> Decimal {
    Decimal::new(20, 2)
}

fn default_initial_exchange_rate() -> Decimal {
    Decimal::new(2, 2)
}

pub(crate) fn default_borrow_rate_max_per_second() -> Decimal {
    // 0.0005e16 mantissa
    Decimal::new(5, 6)
}

pub(crate) fn default_flash_fee_bips() -> u64 {
    8
}
