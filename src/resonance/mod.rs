//! Resonance accrual engine
//!
//! Pure functions mapping a scored measurement plus caller context onto
//! vibrations earned, resonance rank and newly unlocked badges. Nothing here
//! performs I/O; persistence lives behind [`crate::store::AccrualStore`].
//!
//! Flow: MeasurementResult → points → rank-up check → badge check

pub mod badges;
pub mod calendar;
pub mod catalog;
pub mod format;
pub mod points;
pub mod ranks;
pub mod state;

pub use badges::{check_badges, BadgeCatalog};
pub use catalog::{BadgeDefinition, BadgeRule, RankDefinition};
pub use format::format_vibrations;
pub use points::{calculate_points, AccrualContext, PointsBreakdown};
pub use ranks::{current_rank, detect_rank_up, rank_progress, LevelUpCelebration, RankCatalog, RankProgress};
pub use state::UserAccrualState;
