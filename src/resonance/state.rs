//! Per-user accrual state
//!
//! Owned by the storage collaborator. The engine reads it to compute deltas and
//! never mutates it in place.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::RankDefinition;
use super::ranks::RankCatalog;

/// Accumulated gamification state of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccrualState {
    pub user_id: String,
    /// Cumulative points
    pub vibrations: u64,
    /// Includes the measurement being accrued once it is saved
    pub total_measurements: u64,
    pub streak_days: u32,
    pub earned_badge_ids: BTreeSet<String>,
    pub last_measured_at: Option<DateTime<Utc>>,
    /// Offset of the user's local clock from UTC
    pub utc_offset_minutes: i32,
    pub cafes_rated: u32,
    pub libraries_rated: u32,
    pub distinct_vibe_recipients: u32,
    pub cities_rated: u32,
}

impl UserAccrualState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Current rank on `catalog`
    pub fn rank<'a>(&self, catalog: &'a RankCatalog) -> &'a RankDefinition {
        catalog.current_rank(self.vibrations)
    }

    pub fn has_badge(&self, id: &str) -> bool {
        self.earned_badge_ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_defaults_from_partial_json() {
        let state: UserAccrualState =
            serde_json::from_str(r#"{"user_id": "u1", "vibrations": 640}"#).unwrap();
        assert_eq!(state.vibrations, 640);
        assert_eq!(state.total_measurements, 0);
        assert!(state.earned_badge_ids.is_empty());
        assert_eq!(state.rank(RankCatalog::standard()).name, "Resonator");
    }
}
