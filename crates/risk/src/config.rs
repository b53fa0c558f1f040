//! Controller configuration
//!
//! Risk parameters are read as human-readable decimals and converted once
//! into 18-decimal mantissas when the controller is built.

use bankerjoe_core::Exp;
use bankerjoe_market::{MarketParams, MarketVersion};
use bankerjoe_rates::RateModelConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{JoeError, JoeResult};

/// Configuration for the `Joetroller`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // === Liquidation ===
    /// Fraction of a borrow repayable in one liquidation
    #[serde(default = "default_close_factor")]
    pub close_factor: Decimal,

    /// Collateral bonus paid to liquidators (1.08 = 8%)
    #[serde(default = "default_liquidation_incentive")]
    pub liquidation_incentive: Decimal,

    // === Listing ===
    /// Ceiling for any market's collateral factor
    #[serde(default = "default_max_collateral_factor")]
    pub max_collateral_factor: Decimal,

    /// Per-second borrow rate ceiling used by `market_params`
    #[serde(default = "default_borrow_rate_max_per_second")]
    pub borrow_rate_max_per_second: Decimal,

    /// Initial exchange rate used by `market_params`
    #[serde(default = "default_initial_exchange_rate")]
    pub default_initial_exchange_rate: Decimal,

    #[serde(default = "default_flash_fee_bips")]
    pub default_flash_fee_bips: u64,
}

fn default_close_factor() -> Decimal {
    Decimal::new(5, 1)
}

fn default_liquidation_incentive() -> Decimal {
    Decimal::new(108, 2)
}

fn default_max_collateral_factor() -> Decimal {
    Decimal::new(9, 1)
}

fn default_borrow_rate_max_per_second() -> Decimal {
    Decimal::new(5, 6)
}

fn default_initial_exchange_rate() -> Decimal {
    Decimal::new(2, 2)
}

fn default_flash_fee_bips() -> u64 {
    8
}

/// Valid close factor range, inclusive
pub const CLOSE_FACTOR_MIN: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
pub const CLOSE_FACTOR_MAX: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            close_factor: default_close_factor(),
            liquidation_incentive: default_liquidation_incentive(),
            max_collateral_factor: default_max_collateral_factor(),
            borrow_rate_max_per_second: default_borrow_rate_max_per_second(),
            default_initial_exchange_rate: default_initial_exchange_rate(),
            default_flash_fee_bips: default_flash_fee_bips(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Check every bound the controller enforces on its own setters
    pub fn validate(&self) -> JoeResult<()> {
        if self.close_factor < CLOSE_FACTOR_MIN || self.close_factor > CLOSE_FACTOR_MAX {
            return Err(JoeError::InvalidParameter(format!(
                "close factor {} outside [{}, {}]",
                self.close_factor, CLOSE_FACTOR_MIN, CLOSE_FACTOR_MAX
            )));
        }
        if self.liquidation_incentive < Decimal::ONE {
            return Err(JoeError::InvalidParameter(format!(
                "liquidation incentive {} below 1",
                self.liquidation_incentive
            )));
        }
        if self.max_collateral_factor > Decimal::ONE {
            return Err(JoeError::InvalidParameter(format!(
                "max collateral factor {} above 1",
                self.max_collateral_factor
            )));
        }
        if self.default_initial_exchange_rate <= Decimal::ZERO {
            return Err(JoeError::InvalidParameter(
                "initial exchange rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Listing parameters carrying this controller's market defaults
    pub fn market_params(&self, version: MarketVersion, rate_model: RateModelConfig) -> MarketParams {
        MarketParams {
            initial_exchange_rate: self.default_initial_exchange_rate,
            borrow_rate_max_per_second: self.borrow_rate_max_per_second,
            flash_fee_bips: self.default_flash_fee_bips,
            ..MarketParams::new(version, rate_model)
        }
    }

    pub fn close_factor_mantissa(&self) -> JoeResult<Exp> {
        Ok(Exp::from_decimal(self.close_factor)?)
    }

    pub fn liquidation_incentive_mantissa(&self) -> JoeResult<Exp> {
        Ok(Exp::from_decimal(self.liquidation_incentive)?)
    }

    pub fn max_collateral_factor_mantissa(&self) -> JoeResult<Exp> {
        Ok(Exp::from_decimal(self.max_collateral_factor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();

        assert_eq!(config.close_factor, dec!(0.5));
        assert_eq!(config.liquidation_incentive, dec!(1.08));
        assert_eq!(config.max_collateral_factor, dec!(0.9));
        assert_eq!(config.borrow_rate_max_per_second, dec!(0.000005));
        assert_eq!(config.default_initial_exchange_rate, dec!(0.02));
        assert_eq!(config.default_flash_fee_bips, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "close_factor": "0.25" }"#;
        let config: ControllerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.close_factor, dec!(0.25));
        assert_eq!(config.liquidation_incentive, dec!(1.08)); // default
    }

    #[test]
    fn test_close_factor_bounds() {
        let mut config = ControllerConfig::default();
        config.close_factor = dec!(0.05);
        assert!(config.validate().is_ok());
        config.close_factor = dec!(0.9);
        assert!(config.validate().is_ok());
        config.close_factor = dec!(0.04);
        assert!(config.validate().is_err());
        config.close_factor = dec!(0.91);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_incentive_below_one_rejected() {
        let config = ControllerConfig {
            liquidation_incentive: dec!(0.99),
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(JoeError::InvalidParameter(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "liquidation_incentive": "1.1", "default_flash_fee_bips": 5 }}"#).unwrap();

        let config = ControllerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.liquidation_incentive, dec!(1.1));
        assert_eq!(config.default_flash_fee_bips, 5);
        assert_eq!(config.close_factor, dec!(0.5));
    }

    #[test]
    fn test_market_params_use_config_defaults() {
        let config = ControllerConfig {
            default_initial_exchange_rate: dec!(0.5),
            default_flash_fee_bips: 3,
            ..ControllerConfig::default()
        };
        let rate_model = RateModelConfig::JumpRate {
            base_rate_per_year: dec!(0),
            multiplier_per_year: dec!(0.2),
            jump_multiplier_per_year: dec!(2),
            kink: dec!(0.8),
            roof: dec!(1),
            seconds_per_year: bankerjoe_rates::SECONDS_PER_YEAR,
        };

        let params = config.market_params(MarketVersion::Vanilla, rate_model);
        assert_eq!(params.initial_exchange_rate, dec!(0.5));
        assert_eq!(params.flash_fee_bips, 3);
        assert_eq!(params.reserve_factor, dec!(0.2));
    }

    #[test]
    fn test_mantissas() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.close_factor_mantissa().unwrap(),
            Exp::from_decimal(dec!(0.5)).unwrap()
        );
        assert_eq!(
            config.liquidation_incentive_mantissa().unwrap().mantissa(),
            bankerjoe_core::U256::from(1_080_000_000_000_000_000u64)
        );
    }
}
