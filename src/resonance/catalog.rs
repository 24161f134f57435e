//! Static rank and badge catalogs
//!
//! Catalogs are plain data. Replacing them changes thresholds and badges
//! without touching the accrual engine.

use serde::{Deserialize, Serialize};

/// One resonance rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDefinition {
    /// 1-based, strictly increasing
    pub rank: u32,
    pub name: String,
    /// Lowest vibrations total holding this rank
    pub min_vibrations: u64,
    pub icon: String,
    pub color: String,
    pub description: String,
}

impl RankDefinition {
    fn new(rank: u32, name: &str, min_vibrations: u64, icon: &str, color: &str, description: &str) -> Self {
        Self {
            rank,
            name: name.to_string(),
            min_vibrations,
            icon: icon.to_string(),
            color: color.to_string(),
            description: description.to_string(),
        }
    }
}

/// Unlock predicate of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeRule {
    /// The measurement is the user's first
    FirstMeasurement,
    /// Local hour of the measurement is before `hour`
    MeasuredBefore { hour: u32 },
    /// Local hour of the measurement is `hour` or later
    MeasuredFrom { hour: u32 },
    /// Streak reached `days`
    Streak { days: u32 },
    /// Comfort rating of the measurement equals `rating`
    ComfortRating { rating: u8 },
    CafesRated { count: u32 },
    LibrariesRated { count: u32 },
    VibeRecipients { count: u32 },
    CitiesRated { count: u32 },
}

/// One unlockable badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    /// Unique within a catalog
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub rule: BadgeRule,
}

impl BadgeDefinition {
    fn new(id: &str, name: &str, icon: &str, description: &str, rule: BadgeRule) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            description: description.to_string(),
            rule,
        }
    }
}

/// Default rank ladder
pub fn standard_ranks() -> Vec<RankDefinition> {
    vec![
        RankDefinition::new(1, "Listener", 0, "\u{1F442}", "#6B7280", "Just starting to sense the vibes"),
        RankDefinition::new(2, "Sensor", 100, "\u{1F4E1}", "#3B82F6", "Developing frequency awareness"),
        RankDefinition::new(3, "Resonator", 500, "\u{1F50A}", "#8B5CF6", "In tune with the environment"),
        RankDefinition::new(4, "Harmonizer", 1500, "\u{1F3B5}", "#EC4899", "Creating balanced spaces"),
        RankDefinition::new(5, "Frequency Master", 5000, "\u{26A1}", "#F59E0B", "Master of environmental frequencies"),
    ]
}

/// Default badge set
pub fn standard_badges() -> Vec<BadgeDefinition> {
    vec![
        BadgeDefinition::new("first_vibe", "First Vibe", "\u{1F389}", "Complete your first measurement", BadgeRule::FirstMeasurement),
        BadgeDefinition::new("early_bird", "Early Bird", "\u{1F305}", "Measure before 7 AM", BadgeRule::MeasuredBefore { hour: 7 }),
        BadgeDefinition::new("night_owl", "Night Owl", "\u{1F989}", "Measure after 10 PM", BadgeRule::MeasuredFrom { hour: 22 }),
        BadgeDefinition::new("cafe_hunter", "Caf\u{e9} Hunter", "\u{2615}", "Rate 10 different caf\u{e9}s", BadgeRule::CafesRated { count: 10 }),
        BadgeDefinition::new("library_lover", "Library Lover", "\u{1F4DA}", "Rate 5 libraries", BadgeRule::LibrariesRated { count: 5 }),
        BadgeDefinition::new("streak_3", "3-Day Streak", "\u{1F525}", "Measure 3 days in a row", BadgeRule::Streak { days: 3 }),
        BadgeDefinition::new("streak_7", "Week Warrior", "\u{1F4AA}", "Measure 7 days in a row", BadgeRule::Streak { days: 7 }),
        BadgeDefinition::new("streak_30", "Monthly Master", "\u{1F3C6}", "Measure 30 days in a row", BadgeRule::Streak { days: 30 }),
        BadgeDefinition::new("perfect_10", "Perfect 10", "\u{1F4AF}", "Find a location with 10/10 comfort", BadgeRule::ComfortRating { rating: 10 }),
        BadgeDefinition::new("vibe_giver", "Vibe Giver", "\u{1F49D}", "Send vibes to 10 different users", BadgeRule::VibeRecipients { count: 10 }),
        BadgeDefinition::new("explorer", "Explorer", "\u{1F5FA}\u{FE0F}", "Rate locations in 5 different cities", BadgeRule::CitiesRated { count: 5 }),
    ]
}
