//! Badge eligibility
//!
//! Every badge predicate is independent. A single check returns all badges that
//! newly qualify, skipping ones already earned.

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::calendar::local_hour;
use super::catalog::{standard_badges, BadgeDefinition, BadgeRule};
use super::state::UserAccrualState;
use crate::error::VibeError;
use crate::types::MeasurementResult;

static STANDARD_BADGES: OnceLock<BadgeCatalog> = OnceLock::new();

/// Badge set with unique ids
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BadgeCatalog {
    badges: Vec<BadgeDefinition>,
}

impl BadgeCatalog {
    pub fn new(badges: Vec<BadgeDefinition>) -> Result<Self, VibeError> {
        let mut seen = HashSet::new();
        if let Some(dup) = badges.iter().find(|b| !seen.insert(b.id.as_str())) {
            return Err(VibeError::InvalidCatalog(format!("duplicate badge id '{}'", dup.id)));
        }
        Ok(Self { badges })
    }

    /// Shared default badge set
    pub fn standard() -> &'static BadgeCatalog {
        STANDARD_BADGES.get_or_init(|| BadgeCatalog {
            badges: standard_badges(),
        })
    }

    /// Parse and validate a badge set from JSON
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn badges(&self) -> &[BadgeDefinition] {
        &self.badges
    }

    pub fn get(&self, id: &str) -> Option<&BadgeDefinition> {
        self.badges.iter().find(|b| b.id == id)
    }

    /// Badges `stats` newly qualifies for with `result` as the latest measurement.
    ///
    /// `stats` must already count `result` in `total_measurements`. Returned in
    /// catalog order.
    pub fn check(&self, stats: &UserAccrualState, result: &MeasurementResult) -> Vec<BadgeDefinition> {
        let hour = local_hour(result.created_at, stats.utc_offset_minutes);

        self.badges
            .iter()
            .filter(|badge| !stats.has_badge(&badge.id))
            .filter(|badge| match badge.rule {
                BadgeRule::FirstMeasurement => stats.total_measurements == 1,
                BadgeRule::MeasuredBefore { hour: limit } => hour < limit,
                BadgeRule::MeasuredFrom { hour: limit } => hour >= limit,
                BadgeRule::Streak { days } => stats.streak_days >= days,
                BadgeRule::ComfortRating { rating } => result.comfort_rating == rating,
                BadgeRule::CafesRated { count } => stats.cafes_rated >= count,
                BadgeRule::LibrariesRated { count } => stats.libraries_rated >= count,
                BadgeRule::VibeRecipients { count } => stats.distinct_vibe_recipients >= count,
                BadgeRule::CitiesRated { count } => stats.cities_rated >= count,
            })
            .cloned()
            .collect()
    }
}

impl<'de> Deserialize<'de> for BadgeCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let badges = Vec::<BadgeDefinition>::deserialize(deserializer)?;
        BadgeCatalog::new(badges).map_err(serde::de::Error::custom)
    }
}

/// [`BadgeCatalog::check`] on the standard badge set
pub fn check_badges(stats: &UserAccrualState, result: &MeasurementResult) -> Vec<BadgeDefinition> {
    BadgeCatalog::standard().check(stats, result)
}
