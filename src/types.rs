//! Core types for the Vibe Flux engine
//!
//! This module defines the data structures that flow through a measurement run:
//! raw samples, run configuration, progress notifications and the final scored result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VibeError;

/// Golden measurement duration in seconds
pub const DEFAULT_DURATION_SECONDS: u32 = 17;
/// Shortest accepted measurement duration
pub const MIN_DURATION_SECONDS: u32 = 5;
/// Longest accepted measurement duration
pub const MAX_DURATION_SECONDS: u32 = 30;
/// Default sampling cadence (samples per second)
pub const DEFAULT_SAMPLE_RATE: u32 = 10;
/// Highest accepted sampling cadence
pub const MAX_SAMPLE_RATE: u32 = 100;
/// Resting z-axis acceleration (m/s^2)
pub const GRAVITY: f64 = 9.8;

/// 3-axis acceleration reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Motion {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Device at rest under gravity
    pub fn at_rest() -> Self {
        Self::new(0.0, 0.0, GRAVITY)
    }

    /// Magnitude of the deviation from rest under gravity
    pub fn deviation_magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + (self.z - GRAVITY).powi(2)).sqrt()
    }
}

/// One instant of raw sensor data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Sound level (dB)
    pub sound: f64,
    /// Light level (lux)
    pub light: f64,
    /// Acceleration
    pub motion: Motion,
}

/// Parameters for a single measurement run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub duration_seconds: u32,
    pub sample_rate: u32,
    pub use_real_sensors: bool,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECONDS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            use_real_sensors: false,
        }
    }
}

impl MeasurementConfig {
    /// Config with a custom duration and the default cadence
    pub fn with_duration(duration_seconds: u32) -> Self {
        Self {
            duration_seconds,
            ..Default::default()
        }
    }

    /// Reject configs that cannot produce a valid run
    pub fn validate(&self) -> Result<(), VibeError> {
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.duration_seconds) {
            return Err(VibeError::InvalidConfig(format!(
                "duration_seconds must be within [{MIN_DURATION_SECONDS}, {MAX_DURATION_SECONDS}], got {}",
                self.duration_seconds
            )));
        }
        if !(1..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(VibeError::InvalidConfig(format!(
                "sample_rate must be within [1, {MAX_SAMPLE_RATE}], got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Number of samples a full run collects
    pub fn total_samples(&self) -> usize {
        (self.duration_seconds * self.sample_rate) as usize
    }

    /// Delay between two consecutive samples (ms)
    pub fn interval_ms(&self) -> u64 {
        1000 / u64::from(self.sample_rate.max(1))
    }

    /// Load and validate a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Optimal band for one dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn tolerance(&self) -> f64 {
        (self.max - self.min) / 2.0
    }

    /// Inclusive on both ends
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Target bands used to score a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRanges {
    /// Sound level (dB)
    pub sound: TargetRange,
    /// Light level (lux)
    pub light: TargetRange,
    /// Stability (%)
    pub stability: TargetRange,
}

impl Default for OptimalRanges {
    fn default() -> Self {
        Self {
            sound: TargetRange::new(40.0, 60.0),
            light: TargetRange::new(300.0, 500.0),
            stability: TargetRange::new(70.0, 100.0),
        }
    }
}

/// One charting bucket of the frequency series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBucket {
    /// 1-based bucket index
    pub second: u32,
    /// Mean sound of the bucket (dB, one decimal)
    pub sound: f64,
    /// Mean light of the bucket divided by 10 (rounded)
    pub light: f64,
    /// Axis label, e.g. "3s"
    pub label: String,
}

/// Output of one completed measurement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Average sound level (dB, one decimal)
    pub sound_db: f64,
    /// Average light level (lux, whole number)
    pub light_lux: f64,
    /// Stability percentage (one decimal)
    pub stability_percent: f64,
    pub sound_score: u8,
    pub light_score: u8,
    pub stability_score: u8,
    /// Weighted composite (0-100)
    pub vibe_score: u8,
    /// 1-10
    pub comfort_rating: u8,
    pub frequency_data: Vec<FrequencyBucket>,
    pub duration_seconds: u32,
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Progress notification emitted once per sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 0-100
    pub progress_percent: f64,
    pub seconds_remaining: u32,
    pub latest_sample: Sample,
}

impl ProgressUpdate {
    /// Progress after the sample at `index` (0-based) of `total` was collected
    pub fn at(index: usize, total: usize, sample_rate: u32, latest_sample: Sample) -> Self {
        let collected = index + 1;
        let remaining_samples = total.saturating_sub(collected);
        let rate = sample_rate.max(1) as usize;
        Self {
            progress_percent: 100.0 * collected as f64 / total.max(1) as f64,
            seconds_remaining: remaining_samples.div_ceil(rate) as u32,
            latest_sample,
        }
    }
}

/// Notification delivered to run observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MeasurementEvent {
    Progress(ProgressUpdate),
    Complete(MeasurementResult),
}
