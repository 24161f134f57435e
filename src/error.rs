//! Error types for Vibe Flux

use thiserror::Error;

/// Errors that can occur during measurement, scoring or accrual
#[derive(Debug, Error)]
pub enum VibeError {
    #[error("Invalid measurement config: {0}")]
    InvalidConfig(String),

    #[error("A measurement is already running")]
    AlreadyRunning,

    #[error("Cannot analyze an empty sample buffer")]
    EmptySampleBuffer,

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The measurement was persisted but the points delta was not confirmed.
    /// The caller owns `points` and must retry applying it exactly once,
    /// together with `pending_badge_ids` the measurement earned but storage
    /// has not confirmed.
    #[error("Accrual of {points} vibrations for user {user_id} not applied: {reason}")]
    AccrualNotApplied {
        user_id: String,
        points: u64,
        pending_badge_ids: Vec<String>,
        reason: String,
    },
}
