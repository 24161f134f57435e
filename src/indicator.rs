//! Vibe indicator
//!
//! Maps a vibe score onto a display tier. Each tier's lower bound is inclusive.

use serde::{Deserialize, Serialize};

/// Display tier of a vibe score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibeTier {
    Rough,
    Okay,
    Good,
    Great,
    Perfect,
}

impl VibeTier {
    /// Lowest score of the tier
    pub fn min_score(&self) -> u8 {
        match self {
            VibeTier::Perfect => 90,
            VibeTier::Great => 75,
            VibeTier::Good => 60,
            VibeTier::Okay => 40,
            VibeTier::Rough => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VibeTier::Perfect => "Perfect",
            VibeTier::Great => "Great",
            VibeTier::Good => "Good",
            VibeTier::Okay => "Okay",
            VibeTier::Rough => "Rough",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            VibeTier::Perfect => "#10B981",
            VibeTier::Great => "#3B82F6",
            VibeTier::Good => "#8B5CF6",
            VibeTier::Okay => "#F59E0B",
            VibeTier::Rough => "#EF4444",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            VibeTier::Perfect => "\u{1F525}",
            VibeTier::Great => "\u{2728}",
            VibeTier::Good => "\u{1F44D}",
            VibeTier::Okay => "\u{1F610}",
            VibeTier::Rough => "\u{1F4A8}",
        }
    }
}

/// Display data for a vibe score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibeIndicator {
    pub tier: VibeTier,
    /// e.g. "Great Vibe"
    pub label: String,
    pub color: String,
    pub emoji: String,
}

/// Classify a vibe score. Total over all inputs.
pub fn classify(vibe_score: u8) -> VibeIndicator {
    let tier = [
        VibeTier::Perfect,
        VibeTier::Great,
        VibeTier::Good,
        VibeTier::Okay,
    ]
    .into_iter()
    .find(|t| vibe_score >= t.min_score())
    .unwrap_or(VibeTier::Rough);

    VibeIndicator {
        tier,
        label: format!("{} Vibe", tier.name()),
        color: tier.color().to_string(),
        emoji: tier.emoji().to_string(),
    }
}
