//! Resonance ranks
//!
//! A rank is derived from a vibrations total: the highest entry whose threshold
//! does not exceed the total. The catalog is validated on construction so the
//! lookup is total for every non-negative input.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::catalog::{standard_ranks, RankDefinition};
use crate::error::VibeError;

/// Confetti colors following the rank color
const CELEBRATION_ACCENTS: [&str; 3] = ["#FFD700", "#FF69B4", "#00CED1"];

static STANDARD_RANKS: OnceLock<RankCatalog> = OnceLock::new();

/// Progress of a vibrations total towards the next rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankProgress {
    pub current: RankDefinition,
    /// None at the top rank
    pub next: Option<RankDefinition>,
    /// 0-100
    pub progress_percent: f64,
    /// Vibrations still needed; 0 at the top rank
    pub to_next: u64,
}

/// Display data for the rank-up celebration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpCelebration {
    pub rank: RankDefinition,
    /// Confetti palette, rank color first
    pub colors: Vec<String>,
    pub particle_count: u32,
    pub spread: u32,
    /// Vertical origin as a fraction of the screen height
    pub origin_y: f64,
}

impl LevelUpCelebration {
    pub fn for_rank(rank: &RankDefinition) -> Self {
        Self {
            rank: rank.clone(),
            colors: std::iter::once(rank.color.as_str())
                .chain(CELEBRATION_ACCENTS)
                .map(str::to_string)
                .collect(),
            particle_count: 100,
            spread: 70,
            origin_y: 0.6,
        }
    }
}

/// Ordered, validated rank ladder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RankCatalog {
    ranks: Vec<RankDefinition>,
}

impl RankCatalog {
    /// Validate and wrap a rank ladder.
    ///
    /// The ladder must be non-empty, start at 0 vibrations, and have strictly
    /// increasing rank numbers and thresholds.
    pub fn new(ranks: Vec<RankDefinition>) -> Result<Self, VibeError> {
        let first = ranks
            .first()
            .ok_or_else(|| VibeError::InvalidCatalog("rank catalog is empty".to_string()))?;
        if first.min_vibrations != 0 {
            return Err(VibeError::InvalidCatalog(format!(
                "first rank '{}' must start at 0 vibrations",
                first.name
            )));
        }
        for pair in ranks.windows(2) {
            if pair[1].rank <= pair[0].rank || pair[1].min_vibrations <= pair[0].min_vibrations {
                return Err(VibeError::InvalidCatalog(format!(
                    "rank '{}' does not increase over '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }
        Ok(Self { ranks })
    }

    /// Shared default ladder
    pub fn standard() -> &'static RankCatalog {
        STANDARD_RANKS.get_or_init(|| RankCatalog {
            ranks: standard_ranks(),
        })
    }

    /// Parse and validate a ladder from JSON
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn ranks(&self) -> &[RankDefinition] {
        &self.ranks
    }

    fn current_index(&self, vibrations: u64) -> usize {
        // First entry is 0, so at least one threshold always matches
        self.ranks
            .partition_point(|r| r.min_vibrations <= vibrations)
            .saturating_sub(1)
    }

    /// Highest rank whose threshold is at or below `vibrations`
    pub fn current_rank(&self, vibrations: u64) -> &RankDefinition {
        &self.ranks[self.current_index(vibrations)]
    }

    pub fn rank_progress(&self, vibrations: u64) -> RankProgress {
        let index = self.current_index(vibrations);
        let current = &self.ranks[index];

        match self.ranks.get(index + 1) {
            None => RankProgress {
                current: current.clone(),
                next: None,
                progress_percent: 100.0,
                to_next: 0,
            },
            Some(next) => {
                let span = (next.min_vibrations - current.min_vibrations) as f64;
                let gained = (vibrations - current.min_vibrations) as f64;
                RankProgress {
                    current: current.clone(),
                    next: Some(next.clone()),
                    progress_percent: (100.0 * gained / span).clamp(0.0, 100.0),
                    to_next: next.min_vibrations - vibrations,
                }
            }
        }
    }

    /// New rank if `new_vibrations` lands on a higher rank than `old_vibrations`.
    ///
    /// Must be given the before/after pair of a single accrual; a jump across
    /// several thresholds reports the final rank.
    pub fn detect_rank_up(&self, old_vibrations: u64, new_vibrations: u64) -> Option<&RankDefinition> {
        let old = self.current_rank(old_vibrations);
        let new = self.current_rank(new_vibrations);
        (new.rank > old.rank).then_some(new)
    }
}

impl<'de> Deserialize<'de> for RankCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ranks = Vec::<RankDefinition>::deserialize(deserializer)?;
        RankCatalog::new(ranks).map_err(serde::de::Error::custom)
    }
}

/// [`RankCatalog::current_rank`] on the standard ladder
pub fn current_rank(vibrations: u64) -> &'static RankDefinition {
    RankCatalog::standard().current_rank(vibrations)
}

/// [`RankCatalog::rank_progress`] on the standard ladder
pub fn rank_progress(vibrations: u64) -> RankProgress {
    RankCatalog::standard().rank_progress(vibrations)
}

/// [`RankCatalog::detect_rank_up`] on the standard ladder
pub fn detect_rank_up(old_vibrations: u64, new_vibrations: u64) -> Option<&'static RankDefinition> {
    RankCatalog::standard().detect_rank_up(old_vibrations, new_vibrations)
}
