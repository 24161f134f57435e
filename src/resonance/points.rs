//! Vibrations earned per measurement
//!
//! Quality bonuses stack onto the base, the streak multiplier scales that sum,
//! then the flat daily and new-location bonuses are added. Arithmetic is done
//! in tenths so the final half-up rounding is exact.

use serde::{Deserialize, Serialize};

use crate::types::MeasurementResult;

const BASE_POINTS: u64 = 10;
const GOOD_SCORE: u8 = 80;
const GOOD_SCORE_BONUS: u64 = 5;
const GREAT_SCORE: u8 = 90;
const GREAT_SCORE_BONUS: u64 = 10;
const DAILY_BONUS: u64 = 5;
const NEW_LOCATION_BONUS: u64 = 15;
/// Multiplier cap in tenths (2.0x)
const MAX_MULTIPLIER_TENTHS: u64 = 20;

/// Caller-supplied flags for a measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualContext {
    /// First measurement of the user's local day
    pub is_first_today: bool,
    /// The location had no prior measurements
    pub is_new_location: bool,
}

/// Itemized points for one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    /// Base plus quality bonuses, before the multiplier
    pub base: u64,
    /// Streak multiplier in tenths, e.g. 15 for 1.5x
    pub multiplier_tenths: u64,
    pub daily_bonus: u64,
    pub new_location_bonus: u64,
    pub total: u64,
}

impl PointsBreakdown {
    pub fn compute(vibe_score: u8, context: &AccrualContext, streak_days: u32) -> Self {
        let mut base = BASE_POINTS;
        if vibe_score >= GOOD_SCORE {
            base += GOOD_SCORE_BONUS;
        }
        if vibe_score >= GREAT_SCORE {
            base += GREAT_SCORE_BONUS;
        }

        let multiplier_tenths = (10 + u64::from(streak_days)).min(MAX_MULTIPLIER_TENTHS);
        let daily_bonus = if context.is_first_today { DAILY_BONUS } else { 0 };
        let new_location_bonus = if context.is_new_location {
            NEW_LOCATION_BONUS
        } else {
            0
        };

        let tenths = base * multiplier_tenths + 10 * (daily_bonus + new_location_bonus);
        Self {
            base,
            multiplier_tenths,
            daily_bonus,
            new_location_bonus,
            total: (tenths + 5) / 10,
        }
    }

    /// Streak multiplier as a factor
    pub fn multiplier(&self) -> f64 {
        self.multiplier_tenths as f64 / 10.0
    }
}

/// Vibrations earned by a measurement
pub fn calculate_points(result: &MeasurementResult, context: &AccrualContext, streak_days: u32) -> u64 {
    PointsBreakdown::compute(result.vibe_score, context, streak_days).total
}
