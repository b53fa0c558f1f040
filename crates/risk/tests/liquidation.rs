//! Liquidation flow across two markets

mod common;

use anyhow::Result;
use bankerjoe_core::{AccountId, Exp, MarketId, MathError, U256, EXP_SCALE};
use bankerjoe_events::JoeEvent;
use bankerjoe_market::{Market, MarketVersion};
use bankerjoe_oracle::PriceSnapshot;
use bankerjoe_risk::{ControllerConfig, JoeError, Joetroller, Rejection};
use common::*;
use rust_decimal_macros::dec;

fn bob() -> AccountId {
    AccountId::new("BOB")
}

fn carol() -> AccountId {
    AccountId::new("CAROL")
}

/// BOB holds 100 jAVAX as collateral and borrows 1_500 jUSDC, exactly his
/// limit at $20.
fn underwater(version: MarketVersion) -> Joetroller {
    let mut joe = controller_with(version);
    with_usdc_liquidity(&mut joe);
    joe.enter_market(&bob(), &javax()).unwrap();
    joe.mint(&bob(), &javax(), units(100), 0).unwrap();
    joe.borrow(&bob(), &jusdc(), units(1_500), 0, &prices(dec!(20))).unwrap();
    joe
}

#[test]
fn test_seize_token_formula() -> Result<()> {
    let mut joe = controller();
    joe.set_liquidation_incentive(&admin(), Exp::ONE)?;
    let prices = PriceSnapshot::new()
        .with_price(jusdc(), Exp::from_mantissa(U256::from(20_000_000_000u64)))
        .with_price(javax(), Exp::ONE);

    let seize = joe.liquidate_calculate_seize_tokens(&jusdc(), &javax(), EXP_SCALE, &prices)?;
    assert_eq!(seize, U256::from(20_000_000_000u64));
    Ok(())
}

#[test]
fn test_seize_requires_both_prices() {
    let joe = controller();
    let prices = PriceSnapshot::new().with_price(jusdc(), Exp::ONE);
    let result = joe.liquidate_calculate_seize_tokens(&jusdc(), &javax(), EXP_SCALE, &prices);
    assert_eq!(result, Err(JoeError::PriceUnavailable(javax())));
}

#[test]
fn test_seize_propagates_exchange_rate_underflow() -> Result<()> {
    // Restored jAVAX state whose reserves exceed cash + borrows
    let mut state = serde_json::to_value(market(javax(), MarketVersion::Vanilla))?;
    state["total_supply"] = serde_json::to_value(units(100))?;
    state["total_reserves"] = serde_json::to_value(units(1))?;
    let corrupt: Market = serde_json::from_value(state)?;

    let mut joe = Joetroller::new(admin(), &ControllerConfig::default())?;
    joe.support_market(&admin(), market(jusdc(), MarketVersion::Vanilla))?;
    joe.support_market(&admin(), corrupt)?;

    let result = joe.liquidate_calculate_seize_tokens(&jusdc(), &javax(), units(1), &prices(dec!(20)));
    assert_eq!(result, Err(JoeError::Arithmetic(MathError::Underflow)));
    Ok(())
}

#[test]
fn test_healthy_account_not_liquidatable() {
    let mut joe = underwater(MarketVersion::Vanilla);
    let result = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(100), 0, &prices(dec!(20)));
    assert_eq!(result, Err(JoeError::Rejected(Rejection::InsufficientShortfall)));
}

#[test]
fn test_liquidation_repays_and_seizes() -> Result<()> {
    let mut joe = underwater(MarketVersion::Vanilla);
    let prices = prices(dec!(15));

    // close factor 0.5 of 1_500
    let too_much = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(751), 0, &prices);
    assert!(matches!(
        too_much,
        Err(JoeError::Rejected(Rejection::TooMuchRepay { .. }))
    ));

    let receipt = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(700), 0, &prices)?;

    // 700 * 1.08 * 1 / (15 * 1) = 50.4
    let seized = U256::from(504) * EXP_SCALE / 10;
    assert_eq!(receipt.seize_tokens, seized);
    assert!(matches!(receipt.events.last(), Some(JoeEvent::LiquidateBorrow { .. })));

    let usdc = joe.market(&jusdc()).unwrap();
    assert_eq!(usdc.borrow_balance_stored(&bob())?, units(800));
    let avax = joe.market(&javax()).unwrap();
    assert_eq!(avax.token_balance(&bob()), units(100) - seized);
    assert_eq!(avax.token_balance(&carol()), seized);
    Ok(())
}

#[test]
fn test_liquidation_argument_checks() {
    let mut joe = underwater(MarketVersion::Vanilla);
    let prices = prices(dec!(15));

    let same = joe.liquidate_borrow(&bob(), &bob(), &jusdc(), &javax(), units(1), 0, &prices);
    assert_eq!(same, Err(JoeError::InvalidAccountPair));

    let zero = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), U256::zero(), 0, &prices);
    assert_eq!(zero, Err(JoeError::InvalidCloseAmount));

    let stale = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(1), 60, &prices);
    assert!(matches!(stale, Err(JoeError::MarketNotFresh { .. })));
}

#[test]
fn test_failed_liquidation_changes_nothing() -> Result<()> {
    let mut joe = underwater(MarketVersion::Vanilla);
    joe.set_liquidation_incentive(&admin(), exp(dec!(10)))?;
    let before_usdc = joe.market(&jusdc()).unwrap().clone();
    let before_avax = joe.market(&javax()).unwrap().clone();

    // 700 * 10 / 15 = 466 tokens, BOB only has 100
    let result = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(700), 0, &prices(dec!(15)));
    assert!(matches!(
        result,
        Err(JoeError::Rejected(Rejection::SeizeTooMuch { .. }))
    ));
    assert_eq!(joe.market(&jusdc()).unwrap(), &before_usdc);
    assert_eq!(joe.market(&javax()).unwrap(), &before_avax);
    Ok(())
}

#[test]
fn test_credit_account_not_liquidatable() -> Result<()> {
    let mut joe = underwater(MarketVersion::Vanilla);
    joe.set_credit_limit(&admin(), &bob(), units(1))?;
    let result = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(1), 0, &prices(dec!(15)));
    assert_eq!(result, Err(JoeError::Rejected(Rejection::CreditAccountNotLiquidatable)));
    Ok(())
}

#[test]
fn test_seize_paused_blocks_liquidation() -> Result<()> {
    let mut joe = underwater(MarketVersion::Vanilla);
    joe.set_seize_paused(&admin(), true)?;
    let result = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(100), 0, &prices(dec!(15)));
    assert_eq!(result, Err(JoeError::Rejected(Rejection::SeizePaused)));
    Ok(())
}

#[test]
fn test_collateral_cap_seize_registers_for_member_liquidator() -> Result<()> {
    let mut joe = underwater(MarketVersion::CollateralCap);
    joe.enter_market(&carol(), &javax())?;

    let receipt = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(700), 0, &prices(dec!(15)))?;
    let avax = joe.market(&javax()).unwrap();
    assert_eq!(avax.collateral_tokens(&carol()), receipt.seize_tokens);
    assert_eq!(avax.collateral_tokens(&bob()), units(100) - receipt.seize_tokens);
    assert_eq!(avax.total_collateral_tokens(), Some(units(100)));
    Ok(())
}

/// BOB mints 100 jAVAX into a market capped at 60 collateral tokens, so 40
/// stay unregistered, then borrows his full 900 limit at $20.
fn underwater_with_buffer() -> Result<Joetroller> {
    let mut joe = controller_with(MarketVersion::CollateralCap);
    with_usdc_liquidity(&mut joe);
    joe.set_collateral_cap(&admin(), &javax(), units(60))?;
    joe.enter_market(&bob(), &javax())?;
    joe.mint(&bob(), &javax(), units(100), 0)?;
    joe.borrow(&bob(), &jusdc(), units(900), 0, &prices(dec!(20)))?;
    Ok(joe)
}

#[test]
fn test_collateral_cap_seize_takes_registered_tokens() -> Result<()> {
    let mut joe = underwater_with_buffer()?;
    let prices = prices(dec!(15));
    assert_eq!(joe.get_account_liquidity(&bob(), &prices)?.shortfall, units(225));

    // CAROL is not a member of jAVAX
    let receipt = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(450), 0, &prices)?;

    // 450 * 1.08 / 15 = 32.4
    let seized = U256::from(324) * EXP_SCALE / 10;
    assert_eq!(receipt.seize_tokens, seized);

    let avax = joe.market(&javax()).unwrap();
    assert_eq!(avax.token_balance(&bob()), units(100) - seized);
    assert_eq!(avax.collateral_tokens(&bob()), units(60) - seized);
    assert_eq!(avax.token_balance(&carol()), seized);
    assert_eq!(avax.collateral_tokens(&carol()), seized);
    assert_eq!(avax.total_collateral_tokens(), Some(units(60)));
    Ok(())
}

#[test]
fn test_collateral_cap_seize_bounded_by_registered_tokens() -> Result<()> {
    let mut joe = underwater_with_buffer()?;
    joe.set_liquidation_incentive(&admin(), exp(dec!(2.5)))?;
    let before = joe.market(&javax()).unwrap().clone();

    // about 75 tokens: within BOB's 100 balance but above his 60 collateral
    let result = joe.liquidate_borrow(&carol(), &bob(), &jusdc(), &javax(), units(450), 0, &prices(dec!(15)));
    assert!(matches!(
        result,
        Err(JoeError::Rejected(Rejection::SeizeTooMuch { balance, .. })) if balance == units(60)
    ));
    assert_eq!(joe.market(&javax()).unwrap(), &before);
    Ok(())
}

#[test]
fn test_unlisted_market_rejected() {
    let mut joe = underwater(MarketVersion::Vanilla);
    let result = joe.liquidate_borrow(
        &carol(),
        &bob(),
        &jusdc(),
        &MarketId::new("jXYZ"),
        units(1),
        0,
        &prices(dec!(15)),
    );
    assert_eq!(result, Err(JoeError::MarketNotListed(MarketId::new("jXYZ"))));
}
