//! Engine configuration.

use crate::pricing::PricingParams;
use crate::vesting::{validate_milestones, VestingError, VestingMilestone};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fee taken from each trade's notional and accrued to the asset's pool.
    pub swap_fee: Decimal,
    /// Fraction of the vested principal available for instant withdrawal.
    pub max_instant_withdrawal_pct: Decimal,
    /// Cumulative vesting milestones applied to every new LP schedule.
    pub vesting_milestones: Vec<VestingMilestone>,
    pub pricing: PricingParams,
    /// Quantities at or below this are treated as fully filled.
    pub dust: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            swap_fee: dec!(0.003),
            max_instant_withdrawal_pct: dec!(0.25),
            vesting_milestones: vec![
                VestingMilestone { days: 30, percentage: dec!(25) },
                VestingMilestone { days: 60, percentage: dec!(50) },
                VestingMilestone { days: 90, percentage: dec!(75) },
                VestingMilestone { days: 120, percentage: dec!(100) },
            ],
            pricing: PricingParams::default(),
            dust: Decimal::from_parts(1, 0, 0, false, 6),
        }
    }
}

impl EngineConfig {
    /// Short vesting horizon for demos and tests.
    pub fn fast_vesting() -> Self {
        Self {
            vesting_milestones: vec![
                VestingMilestone { days: 1, percentage: dec!(50) },
                VestingMilestone { days: 2, percentage: dec!(100) },
            ],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swap_fee < Decimal::ZERO || self.swap_fee >= Decimal::ONE {
            return Err(ConfigError::FeeOutOfRange { fee: self.swap_fee });
        }
        if self.max_instant_withdrawal_pct < Decimal::ZERO
            || self.max_instant_withdrawal_pct > Decimal::ONE
        {
            return Err(ConfigError::WithdrawalPctOutOfRange {
                pct: self.max_instant_withdrawal_pct,
            });
        }
        if self.dust < Decimal::ZERO {
            return Err(ConfigError::NegativeDust { dust: self.dust });
        }
        validate_milestones(&self.vesting_milestones)?;
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Swap fee {fee} must be in [0, 1)")]
    FeeOutOfRange { fee: Decimal },
    #[error("Instant withdrawal fraction {pct} must be in [0, 1]")]
    WithdrawalPctOutOfRange { pct: Decimal },
    #[error("Dust tolerance {dust} must be non-negative")]
    NegativeDust { dust: Decimal },
    #[error(transparent)]
    Vesting(#[from] VestingError),
}
