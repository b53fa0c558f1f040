//! Piecewise-linear borrow rate curves
//!
//! All rates are per-second mantissas. Utilization above `roof` is clamped
//! to `roof` before the curve is evaluated.

use bankerjoe_core::{Exp, MathResult, U256};
use serde::{Deserialize, Serialize};

use crate::error::RateModelError;

/// `borrows / (cash + borrows - reserves)`, zero when nothing is borrowed.
pub fn utilization_rate(cash: U256, borrows: U256, reserves: U256) -> MathResult<Exp> {
    if borrows.is_zero() {
        return Ok(Exp::ZERO);
    }
    let supplied = bankerjoe_core::math::sub(bankerjoe_core::math::add(cash, borrows)?, reserves)?;
    Exp::from_ratio(borrows, supplied)
}

/// Jump-rate model: one kink, steeper slope above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpRateModel {
    pub base_rate_per_second: Exp,
    pub multiplier_per_second: Exp,
    pub jump_multiplier_per_second: Exp,
    pub kink: Exp,
    pub roof: Exp,
}

impl JumpRateModel {
    pub fn new(
        base_rate_per_second: Exp,
        multiplier_per_second: Exp,
        jump_multiplier_per_second: Exp,
        kink: Exp,
        roof: Exp,
    ) -> Result<Self, RateModelError> {
        if roof.is_zero() {
            return Err(RateModelError::ZeroRoof);
        }
        if kink > roof {
            return Err(RateModelError::KinkAboveRoof { kink, roof });
        }
        Ok(Self {
            base_rate_per_second,
            multiplier_per_second,
            jump_multiplier_per_second,
            kink,
            roof,
        })
    }

    /// Build from yearly rates, dividing each by `seconds_per_year`.
    pub fn from_yearly(
        base_rate_per_year: Exp,
        multiplier_per_year: Exp,
        jump_multiplier_per_year: Exp,
        kink: Exp,
        roof: Exp,
        seconds_per_year: u64,
    ) -> Result<Self, RateModelError> {
        if seconds_per_year == 0 {
            return Err(RateModelError::ZeroSecondsPerYear);
        }
        let secs = U256::from(seconds_per_year);
        Self::new(
            base_rate_per_year.div_scalar(secs)?,
            multiplier_per_year.div_scalar(secs)?,
            jump_multiplier_per_year.div_scalar(secs)?,
            kink,
            roof,
        )
    }

    fn borrow_rate_at(&self, util: Exp) -> MathResult<Exp> {
        if util <= self.kink {
            return util.mul(self.multiplier_per_second)?.add(self.base_rate_per_second);
        }
        let normal_rate = self
            .kink
            .mul(self.multiplier_per_second)?
            .add(self.base_rate_per_second)?;
        let excess = util.sub(self.kink)?;
        excess.mul(self.jump_multiplier_per_second)?.add(normal_rate)
    }
}

/// Triple-slope model: rises to `kink1`, flat until `kink2`, jumps after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleSlopeModel {
    pub base_rate_per_second: Exp,
    pub multiplier_per_second: Exp,
    pub jump_multiplier_per_second: Exp,
    pub kink1: Exp,
    pub kink2: Exp,
    pub roof: Exp,
}

impl TripleSlopeModel {
    pub fn new(
        base_rate_per_second: Exp,
        multiplier_per_second: Exp,
        jump_multiplier_per_second: Exp,
        kink1: Exp,
        kink2: Exp,
        roof: Exp,
    ) -> Result<Self, RateModelError> {
        if roof.is_zero() {
            return Err(RateModelError::ZeroRoof);
        }
        if kink1 > kink2 {
            return Err(RateModelError::KinksOutOfOrder { kink1, kink2 });
        }
        if kink2 > roof {
            return Err(RateModelError::KinkAboveRoof { kink: kink2, roof });
        }
        Ok(Self {
            base_rate_per_second,
            multiplier_per_second,
            jump_multiplier_per_second,
            kink1,
            kink2,
            roof,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_yearly(
        base_rate_per_year: Exp,
        multiplier_per_year: Exp,
        jump_multiplier_per_year: Exp,
        kink1: Exp,
        kink2: Exp,
        roof: Exp,
        seconds_per_year: u64,
    ) -> Result<Self, RateModelError> {
        if seconds_per_year == 0 {
            return Err(RateModelError::ZeroSecondsPerYear);
        }
        let secs = U256::from(seconds_per_year);
        Self::new(
            base_rate_per_year.div_scalar(secs)?,
            multiplier_per_year.div_scalar(secs)?,
            jump_multiplier_per_year.div_scalar(secs)?,
            kink1,
            kink2,
            roof,
        )
    }

    fn rising_segment(&self, util: Exp) -> MathResult<Exp> {
        util.mul(self.multiplier_per_second)?.add(self.base_rate_per_second)
    }

    fn flat_segment(&self) -> MathResult<Exp> {
        self.rising_segment(self.kink1)
    }

    fn jump_segment(&self, util: Exp) -> MathResult<Exp> {
        let excess = util.sub(self.kink2)?;
        excess.mul(self.jump_multiplier_per_second)?.add(self.flat_segment()?)
    }

    fn borrow_rate_at(&self, util: Exp) -> MathResult<Exp> {
        if util <= self.kink1 {
            self.rising_segment(util)
        } else if util <= self.kink2 {
            self.flat_segment()
        } else {
            self.jump_segment(util)
        }
    }
}

/// Pluggable rate curve attached to a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterestRateModel {
    JumpRate(JumpRateModel),
    TripleSlope(TripleSlopeModel),
}

impl InterestRateModel {
    pub fn roof(&self) -> Exp {
        match self {
            InterestRateModel::JumpRate(m) => m.roof,
            InterestRateModel::TripleSlope(m) => m.roof,
        }
    }

    /// Utilization clamped to the model's roof
    pub fn utilization(&self, cash: U256, borrows: U256, reserves: U256) -> MathResult<Exp> {
        let util = utilization_rate(cash, borrows, reserves)?;
        Ok(util.min(self.roof()))
    }

    /// Per-second borrow rate
    pub fn get_borrow_rate(&self, cash: U256, borrows: U256, reserves: U256) -> MathResult<Exp> {
        let util = self.utilization(cash, borrows, reserves)?;
        match self {
            InterestRateModel::JumpRate(m) => m.borrow_rate_at(util),
            InterestRateModel::TripleSlope(m) => m.borrow_rate_at(util),
        }
    }

    /// Per-second supply rate: `borrow_rate * utilization * (1 - reserve_factor)`
    pub fn get_supply_rate(
        &self,
        cash: U256,
        borrows: U256,
        reserves: U256,
        reserve_factor: Exp,
    ) -> MathResult<Exp> {
        let one_minus_reserve_factor = Exp::ONE.sub(reserve_factor)?;
        let borrow_rate = self.get_borrow_rate(cash, borrows, reserves)?;
        let rate_to_pool = borrow_rate.mul(one_minus_reserve_factor)?;
        self.utilization(cash, borrows, reserves)?.mul(rate_to_pool)
    }
}

impl From<JumpRateModel> for InterestRateModel {
    fn from(model: JumpRateModel) -> Self {
        InterestRateModel::JumpRate(model)
    }
}

impl From<TripleSlopeModel> for InterestRateModel {
    fn from(model: TripleSlopeModel) -> Self {
        InterestRateModel::TripleSlope(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SECONDS_PER_YEAR;
    use bankerjoe_core::MathError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn exp(value: Decimal) -> Exp {
        Exp::from_decimal(value).unwrap()
    }

    fn units(n: u64) -> U256 {
        U256::from(n) * bankerjoe_core::EXP_SCALE
    }

    fn jump_model() -> InterestRateModel {
        JumpRateModel::from_yearly(
            exp(dec!(0.1)),
            exp(dec!(0.45)),
            exp(dec!(5)),
            exp(dec!(0.8)),
            exp(dec!(1)),
            SECONDS_PER_YEAR,
        )
        .unwrap()
        .into()
    }

    fn triple_model() -> TripleSlopeModel {
        TripleSlopeModel::from_yearly(
            exp(dec!(0)),
            exp(dec!(0.2)),
            exp(dec!(3)),
            exp(dec!(0.8)),
            exp(dec!(0.9)),
            exp(dec!(1)),
            SECONDS_PER_YEAR,
        )
        .unwrap()
    }

    fn yearly(rate: Exp) -> Decimal {
        rate.mul_scalar(U256::from(SECONDS_PER_YEAR))
            .unwrap()
            .to_decimal()
            .unwrap()
    }

    #[test]
    fn test_utilization_zero_when_no_borrows() {
        let util = utilization_rate(units(100), U256::zero(), units(5)).unwrap();
        assert_eq!(util, Exp::ZERO);
    }

    #[test]
    fn test_utilization_with_reserves() {
        // 50 / (60 + 50 - 10) = 0.5
        let util = utilization_rate(units(60), units(50), units(10)).unwrap();
        assert_eq!(util, exp(dec!(0.5)));
    }

    #[test]
    fn test_utilization_underflow_when_reserves_exceed_supply() {
        let result = utilization_rate(units(1), units(1), units(5));
        assert_eq!(result, Err(MathError::Underflow));
    }

    #[test]
    fn test_jump_rate_below_kink() {
        // u = 0.5 -> 0.1 + 0.5 * 0.45 = 0.325 per year
        let model = jump_model();
        let rate = model.get_borrow_rate(units(500), units(500), U256::zero()).unwrap();
        let annual = yearly(rate);
        assert!((annual - dec!(0.325)).abs() < dec!(0.01), "annual rate {}", annual);
    }

    #[test]
    fn test_jump_rate_above_kink() {
        // u = 0.9 -> 0.1 + 0.8 * 0.45 + 0.1 * 5 = 0.96 per year
        let model = jump_model();
        let rate = model.get_borrow_rate(units(100), units(900), U256::zero()).unwrap();
        let annual = yearly(rate);
        assert!((annual - dec!(0.96)).abs() < dec!(0.01), "annual rate {}", annual);
    }

    #[test]
    fn test_jump_rate_clamps_to_roof() {
        let model: InterestRateModel = JumpRateModel::from_yearly(
            exp(dec!(0.1)),
            exp(dec!(0.45)),
            exp(dec!(5)),
            exp(dec!(0.8)),
            exp(dec!(0.9)),
            SECONDS_PER_YEAR,
        )
        .unwrap()
        .into();

        // u = 0.95 and u = 0.99 both clamp to 0.9
        let at_95 = model.get_borrow_rate(units(5), units(95), U256::zero()).unwrap();
        let at_99 = model.get_borrow_rate(units(1), units(99), U256::zero()).unwrap();
        assert_eq!(at_95, at_99);
        assert_eq!(model.utilization(units(1), units(99), U256::zero()).unwrap(), exp(dec!(0.9)));
    }

    #[test]
    fn test_jump_rate_rejects_kink_above_roof() {
        let result = JumpRateModel::new(
            Exp::ZERO,
            Exp::ZERO,
            Exp::ZERO,
            exp(dec!(0.95)),
            exp(dec!(0.9)),
        );
        assert!(matches!(result, Err(RateModelError::KinkAboveRoof { .. })));
    }

    #[test]
    fn test_triple_slope_rejects_unordered_kinks() {
        let result = TripleSlopeModel::new(
            Exp::ZERO,
            Exp::ZERO,
            Exp::ZERO,
            exp(dec!(0.9)),
            exp(dec!(0.8)),
            exp(dec!(1)),
        );
        assert!(matches!(result, Err(RateModelError::KinksOutOfOrder { .. })));
    }

    #[test]
    fn test_triple_slope_continuous_at_kink1() {
        let model = triple_model();
        let below = model.rising_segment(model.kink1).unwrap();
        let between = model.flat_segment().unwrap();
        assert_eq!(below, between);
    }

    #[test]
    fn test_triple_slope_continuous_at_kink2() {
        let model = triple_model();
        let between = model.flat_segment().unwrap();
        let above = model.jump_segment(model.kink2).unwrap();
        assert_eq!(between, above);
    }

    #[test]
    fn test_triple_slope_segments() {
        let model: InterestRateModel = triple_model().into();

        // u = 0.5 -> 0.5 * 0.2 = 0.1
        let low = model.get_borrow_rate(units(50), units(50), U256::zero()).unwrap();
        assert!((yearly(low) - dec!(0.1)).abs() < dec!(0.0001));

        // u = 0.85 is on the flat segment -> 0.8 * 0.2 = 0.16
        let flat = model.get_borrow_rate(units(15), units(85), U256::zero()).unwrap();
        assert!((yearly(flat) - dec!(0.16)).abs() < dec!(0.0001));

        // u = 0.95 -> 0.16 + 0.05 * 3 = 0.31
        let high = model.get_borrow_rate(units(5), units(95), U256::zero()).unwrap();
        assert!((yearly(high) - dec!(0.31)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_supply_rate() {
        // u = 0.5, borrow = 0.325, reserve factor 0.2 -> 0.325 * 0.5 * 0.8 = 0.13
        let model = jump_model();
        let rate = model
            .get_supply_rate(units(500), units(500), U256::zero(), exp(dec!(0.2)))
            .unwrap();
        assert!((yearly(rate) - dec!(0.13)).abs() < dec!(0.01));
    }

    #[test]
    fn test_supply_rate_rejects_reserve_factor_above_one() {
        let model = jump_model();
        let result = model.get_supply_rate(units(1), units(1), U256::zero(), exp(dec!(1.5)));
        assert_eq!(result, Err(MathError::Underflow));
    }

    #[test]
    fn test_cash_plus_borrows_overflow() {
        let model = jump_model();
        let result = model.get_borrow_rate(U256::MAX, U256::one(), U256::zero());
        assert_eq!(result, Err(MathError::Overflow));
    }
}
