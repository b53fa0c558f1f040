//! Exp - 18-decimal fixed-point mantissa arithmetic
//!
//! Rates, prices, factors and indexes are all mantissas: a `U256` scaled by
//! 1e18, so `0.5` is stored as `5e17`. Every operation is checked and every
//! division truncates toward zero. Nothing here saturates or wraps.

use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of fractional digits carried by a mantissa
pub const MANTISSA_DECIMALS: u32 = 18;

/// 1e18
pub const EXP_SCALE: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// Arithmetic failures. Never silently recovered from.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivideByZero,
}

pub type MathResult<T> = Result<T, MathError>;

#[inline]
pub fn add(a: U256, b: U256) -> MathResult<U256> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn sub(a: U256, b: U256) -> MathResult<U256> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

#[inline]
pub fn mul(a: U256, b: U256) -> MathResult<U256> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn div(a: U256, b: U256) -> MathResult<U256> {
    if b.is_zero() {
        return Err(MathError::DivideByZero);
    }
    Ok(a / b)
}

/// `a * b / 1e18`
pub fn mul_mantissa(a: U256, b: U256) -> MathResult<U256> {
    div(mul(a, b)?, EXP_SCALE)
}

/// `a * 1e18 / b`
pub fn div_mantissa(a: U256, b: U256) -> MathResult<U256> {
    if b.is_zero() {
        return Err(MathError::DivideByZero);
    }
    div(mul(a, EXP_SCALE)?, b)
}

/// Drop the fractional part of a mantissa: `a / 1e18`
#[inline]
pub fn truncate(a: U256) -> U256 {
    a / EXP_SCALE
}

/// A fixed-point number scaled by 1e18.
///
/// # Example
/// ```
/// use bankerjoe_core::{Exp, U256};
///
/// let half = Exp::from_ratio(U256::from(1), U256::from(2)).unwrap();
/// let quarter = half.mul(half).unwrap();
/// assert_eq!(quarter.mul_scalar_truncate(U256::from(100)).unwrap(), U256::from(25));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exp(U256);

impl Exp {
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));
    pub const ONE: Self = Self(EXP_SCALE);

    #[inline]
    pub const fn from_mantissa(mantissa: U256) -> Self {
        Self(mantissa)
    }

    #[inline]
    pub const fn mantissa(&self) -> U256 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whole-number value as a mantissa (`n * 1e18`)
    pub fn from_scalar(n: U256) -> MathResult<Self> {
        mul(n, EXP_SCALE).map(Self)
    }

    /// `num / den` as a mantissa
    pub fn from_ratio(num: U256, den: U256) -> MathResult<Self> {
        div_mantissa(num, den).map(Self)
    }

    pub fn add(self, other: Exp) -> MathResult<Self> {
        add(self.0, other.0).map(Self)
    }

    pub fn sub(self, other: Exp) -> MathResult<Self> {
        sub(self.0, other.0).map(Self)
    }

    pub fn mul(self, other: Exp) -> MathResult<Self> {
        mul_mantissa(self.0, other.0).map(Self)
    }

    pub fn mul_scalar(self, n: U256) -> MathResult<Self> {
        mul(self.0, n).map(Self)
    }

    pub fn div(self, other: Exp) -> MathResult<Self> {
        div_mantissa(self.0, other.0).map(Self)
    }

    pub fn div_scalar(self, n: U256) -> MathResult<Self> {
        div(self.0, n).map(Self)
    }

    #[inline]
    pub fn truncate(self) -> U256 {
        truncate(self.0)
    }

    /// `truncate(self * n)`
    pub fn mul_scalar_truncate(self, n: U256) -> MathResult<U256> {
        Ok(self.mul_scalar(n)?.truncate())
    }

    /// `truncate(self * n) + addend`
    pub fn mul_scalar_truncate_add(self, n: U256, addend: U256) -> MathResult<U256> {
        add(self.mul_scalar_truncate(n)?, addend)
    }

    /// Convert a human-readable decimal (e.g. `0.75`) into a mantissa.
    ///
    /// Digits beyond the 18th fractional place are truncated.
    /// Negative values are rejected with `Underflow`.
    pub fn from_decimal(value: Decimal) -> MathResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::Underflow);
        }

        let raw = U256::from(value.mantissa().unsigned_abs());
        let scale = value.scale();

        let mantissa = if scale <= MANTISSA_DECIMALS {
            mul(raw, U256::exp10((MANTISSA_DECIMALS - scale) as usize))?
        } else {
            div(raw, U256::exp10((scale - MANTISSA_DECIMALS) as usize))?
        };

        Ok(Self(mantissa))
    }

    /// Back to a `Decimal`, if the mantissa fits in 96 bits.
    pub fn to_decimal(&self) -> Option<Decimal> {
        if self.0.bits() > 96 {
            return None;
        }
        let raw = self.0.low_u128() as i128;
        Some(Decimal::from_i128_with_scale(raw, MANTISSA_DECIMALS).normalize())
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / EXP_SCALE;
        let frac = self.0 % EXP_SCALE;
        if frac.is_zero() {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0>18}", frac.to_string());
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl From<U256> for Exp {
    fn from(mantissa: U256) -> Self {
        Self(mantissa)
    }
}

impl From<Exp> for U256 {
    fn from(exp: Exp) -> Self {
        exp.0
    }
}
