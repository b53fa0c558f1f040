//! Rate model configuration
//!
//! Models are configured with human-readable yearly rates and converted once
//! into per-second mantissas.

use bankerjoe_core::Exp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RateModelError;
use crate::model::{InterestRateModel, JumpRateModel, TripleSlopeModel};

/// 365 days of seconds
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Serializable description of an interest rate model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateModelConfig {
    JumpRate {
        base_rate_per_year: Decimal,
        multiplier_per_year: Decimal,
        jump_multiplier_per_year: Decimal,
        kink: Decimal,
        #[serde(default = "default_roof")]
        roof: Decimal,
        #[serde(default = "default_seconds_per_year")]
        seconds_per_year: u64,
    },
    TripleSlope {
        base_rate_per_year: Decimal,
        multiplier_per_year: Decimal,
        jump_multiplier_per_year: Decimal,
        kink1: Decimal,
        kink2: Decimal,
        #[serde(default = "default_roof")]
        roof: Decimal,
        #[serde(default = "default_seconds_per_year")]
        seconds_per_year: u64,
    },
}

fn default_roof() -> Decimal {
    Decimal::ONE
}

fn default_seconds_per_year() -> u64 {
    SECONDS_PER_YEAR
}

impl RateModelConfig {
    /// Build the per-second model, validating kinks against the roof.
    pub fn build(&self) -> Result<InterestRateModel, RateModelError> {
        match self {
            RateModelConfig::JumpRate {
                base_rate_per_year,
                multiplier_per_year,
                jump_multiplier_per_year,
                kink,
                roof,
                seconds_per_year,
            } => Ok(JumpRateModel::from_yearly(
                Exp::from_decimal(*base_rate_per_year)?,
                Exp::from_decimal(*multiplier_per_year)?,
                Exp::from_decimal(*jump_multiplier_per_year)?,
                Exp::from_decimal(*kink)?,
                Exp::from_decimal(*roof)?,
                *seconds_per_year,
            )?
            .into()),
            RateModelConfig::TripleSlope {
                base_rate_per_year,
                multiplier_per_year,
                jump_multiplier_per_year,
                kink1,
                kink2,
                roof,
                seconds_per_year,
            } => Ok(TripleSlopeModel::from_yearly(
                Exp::from_decimal(*base_rate_per_year)?,
                Exp::from_decimal(*multiplier_per_year)?,
                Exp::from_decimal(*jump_multiplier_per_year)?,
                Exp::from_decimal(*kink1)?,
                Exp::from_decimal(*kink2)?,
                Exp::from_decimal(*roof)?,
                *seconds_per_year,
            )?
            .into()),
        }
    }
}
