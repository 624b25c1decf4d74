//! LP principal vesting schedules.
//!
//! Each milestone carries the TOTAL percentage vested once its date passes,
//! not an increment. The vested fraction at any instant is the largest
//! percentage among the milestones already reached, so a late milestone can
//! never vest less than an earlier one.

use crate::types::{PoolId, Timestamp, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VestingMilestone {
    /// Days after the first contribution.
    pub days: u32,
    /// Cumulative percentage vested at that point (0..=100).
    pub percentage: Decimal,
}

/// Validate a milestone list: non-empty, strictly increasing in both days and
/// percentage, ending at exactly 100.
pub fn validate_milestones(milestones: &[VestingMilestone]) -> Result<(), VestingError> {
    let last = milestones.last().ok_or(VestingError::EmptySchedule)?;
    if last.percentage != dec!(100) {
        return Err(VestingError::IncompleteSchedule {
            final_percentage: last.percentage,
        });
    }
    for m in milestones {
        if m.percentage <= Decimal::ZERO || m.percentage > dec!(100) {
            return Err(VestingError::PercentageOutOfRange {
                percentage: m.percentage,
            });
        }
    }
    for pair in milestones.windows(2) {
        if pair[1].days <= pair[0].days || pair[1].percentage <= pair[0].percentage {
            return Err(VestingError::NotIncreasing {
                days: pair[1].days,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnlockRow {
    pub unlock_date: Timestamp,
    /// Cumulative percentage, copied from the milestone.
    pub unlock_percentage: Decimal,
}

/// One schedule per (user, pool), anchored at the user's first contribution.
/// Later contributions join the same schedule rather than restarting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockSchedule {
    pub user_id: UserId,
    pub pool_id: PoolId,
    pub rows: Vec<UnlockRow>,
    pub created_at: Timestamp,
}

impl UnlockSchedule {
    pub fn new(
        user_id: UserId,
        pool_id: PoolId,
        milestones: &[VestingMilestone],
        created_at: Timestamp,
    ) -> Self {
        let rows = milestones
            .iter()
            .map(|m| UnlockRow {
                unlock_date: created_at.plus_days(m.days),
                unlock_percentage: m.percentage,
            })
            .collect();
        Self {
            user_id,
            pool_id,
            rows,
            created_at,
        }
    }

    /// Fraction of principal vested at `now`, in [0, 1]. Zero before the
    /// first milestone, 1 after the last.
    pub fn vested_fraction(&self, now: Timestamp) -> Decimal {
        self.rows
            .iter()
            .filter(|r| r.unlock_date.0 <= now.0)
            .map(|r| r.unlock_percentage)
            .max()
            .unwrap_or(Decimal::ZERO)
            / dec!(100)
    }

    pub fn fully_vested(&self, now: Timestamp) -> bool {
        self.vested_fraction(now) == Decimal::ONE
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VestingError {
    #[error("Vesting schedule has no milestones")]
    EmptySchedule,
    #[error("Vesting schedule ends at {final_percentage}%, must end at 100%")]
    IncompleteSchedule { final_percentage: Decimal },
    #[error("Vesting percentage {percentage} out of (0, 100] range")]
    PercentageOutOfRange { percentage: Decimal },
    #[error("Vesting milestones must be strictly increasing (violated at day {days})")]
    NotIncreasing { days: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_milestones() -> Vec<VestingMilestone> {
        vec![
            VestingMilestone { days: 30, percentage: dec!(25) },
            VestingMilestone { days: 60, percentage: dec!(50) },
            VestingMilestone { days: 90, percentage: dec!(75) },
            VestingMilestone { days: 120, percentage: dec!(100) },
        ]
    }

    #[test]
    fn default_milestones_validate() {
        validate_milestones(&default_milestones()).unwrap();
    }

    #[test]
    fn rejects_non_increasing_and_incomplete() {
        let mut dup_days = default_milestones();
        dup_days[1].days = 30;
        assert!(validate_milestones(&dup_days).is_err());

        let mut regressing = default_milestones();
        regressing[2].percentage = dec!(40);
        assert!(validate_milestones(&regressing).is_err());

        let short = vec![VestingMilestone { days: 30, percentage: dec!(60) }];
        assert!(matches!(
            validate_milestones(&short),
            Err(VestingError::IncompleteSchedule { .. })
        ));

        assert!(matches!(
            validate_milestones(&[]),
            Err(VestingError::EmptySchedule)
        ));
    }

    #[test]
    fn vested_fraction_steps_at_milestones() {
        let start = Timestamp::from_millis(0);
        let schedule =
            UnlockSchedule::new(UserId(1), PoolId(1), &default_milestones(), start);

        assert_eq!(schedule.vested_fraction(start), dec!(0));
        assert_eq!(schedule.vested_fraction(start.plus_days(29)), dec!(0));
        assert_eq!(schedule.vested_fraction(start.plus_days(30)), dec!(0.25));
        assert_eq!(schedule.vested_fraction(start.plus_days(89)), dec!(0.5));
        assert_eq!(schedule.vested_fraction(start.plus_days(90)), dec!(0.75));
        assert_eq!(schedule.vested_fraction(start.plus_days(365)), dec!(1));
        assert!(schedule.fully_vested(start.plus_days(120)));
    }
}
