//! Shared fixture: two vanilla markets, jUSDC at $1 and jAVAX at $20, both
//! with a 0.75 collateral factor and an exchange rate of 1.

#![allow(dead_code)]

use bankerjoe_core::{AccountId, Exp, MarketId, U256, EXP_SCALE};
use bankerjoe_market::{Market, MarketVersion};
use bankerjoe_oracle::PriceSnapshot;
use bankerjoe_rates::{JumpRateModel, SECONDS_PER_YEAR};
use bankerjoe_risk::{ControllerConfig, Joetroller};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn units(n: u64) -> U256 {
    U256::from(n) * EXP_SCALE
}

pub fn exp(value: Decimal) -> Exp {
    Exp::from_decimal(value).unwrap()
}

pub fn admin() -> AccountId {
    AccountId::new("ADMIN")
}

pub fn jusdc() -> MarketId {
    MarketId::new("jUSDC")
}

pub fn javax() -> MarketId {
    MarketId::new("jAVAX")
}

pub fn market(id: MarketId, version: MarketVersion) -> Market {
    market_with_rate(id, version, Exp::ONE)
}

pub fn market_with_rate(id: MarketId, version: MarketVersion, initial_exchange_rate: Exp) -> Market {
    let model = JumpRateModel::from_yearly(
        exp(dec!(0.02)),
        exp(dec!(0.2)),
        exp(dec!(2)),
        exp(dec!(0.8)),
        Exp::ONE,
        SECONDS_PER_YEAR,
    )
    .unwrap();
    Market::new(id, version, model.into(), initial_exchange_rate, 0).unwrap()
}

pub fn prices(avax: Decimal) -> PriceSnapshot {
    PriceSnapshot::new()
        .with_price(jusdc(), Exp::ONE)
        .with_price(javax(), exp(avax))
}

pub fn controller_with(avax_version: MarketVersion) -> Joetroller {
    init_tracing();
    let mut joe = Joetroller::new(admin(), &ControllerConfig::default()).unwrap();
    joe.support_market(&admin(), market(jusdc(), MarketVersion::Vanilla)).unwrap();
    joe.support_market(&admin(), market(javax(), avax_version)).unwrap();

    let prices = prices(dec!(20));
    joe.set_collateral_factor(&admin(), &jusdc(), exp(dec!(0.75)), &prices).unwrap();
    joe.set_collateral_factor(&admin(), &javax(), exp(dec!(0.75)), &prices).unwrap();
    joe
}

pub fn controller() -> Joetroller {
    controller_with(MarketVersion::Vanilla)
}

/// ALICE supplies 10_000 jUSDC of lending liquidity
pub fn with_usdc_liquidity(joe: &mut Joetroller) {
    joe.mint(&AccountId::new("ALICE"), &jusdc(), units(10_000), 0).unwrap();
}
