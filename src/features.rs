//! Feature derivation
//!
//! This module derives run-level features from a sample buffer:
//! - Sound and light averages
//! - Motion deviation magnitudes and their variance
//! - The time-bucketed frequency series used for charting

use serde::{Deserialize, Serialize};

use crate::normalizer::{mean, round_to, variance, Normalizer};
use crate::types::{FrequencyBucket, Sample};

/// Chart amplitude divisor applied to light
const LIGHT_CHART_SCALE: f64 = 10.0;

/// Unrounded aggregates of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunFeatures {
    pub avg_sound: f64,
    pub avg_light: f64,
    pub avg_motion: f64,
    pub motion_variance: f64,
    /// 0-100
    pub stability_percent: f64,
}

/// Feature deriver for computing run features
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive features from a sample buffer. `None` when the buffer is empty.
    pub fn derive(samples: &[Sample]) -> Option<RunFeatures> {
        let avg_sound = mean(samples.iter().map(|s| s.sound))?;
        let avg_light = mean(samples.iter().map(|s| s.light))?;

        let magnitudes: Vec<f64> = samples
            .iter()
            .map(|s| s.motion.deviation_magnitude())
            .collect();
        let avg_motion = mean(magnitudes.iter().copied())?;
        let motion_variance = variance(&magnitudes)?;

        Some(RunFeatures {
            avg_sound,
            avg_light,
            avg_motion,
            motion_variance,
            stability_percent: Normalizer::stability_from_variance(motion_variance),
        })
    }

    /// Partition samples into `buckets` contiguous chunks of `len / buckets` samples
    /// (trailing remainder dropped) and average each chunk.
    pub fn frequency_series(samples: &[Sample], buckets: u32) -> Vec<FrequencyBucket> {
        if buckets == 0 {
            return Vec::new();
        }
        let chunk_size = samples.len() / buckets as usize;
        if chunk_size == 0 {
            return Vec::new();
        }

        samples
            .chunks_exact(chunk_size)
            .take(buckets as usize)
            .zip(1u32..)
            .filter_map(|(chunk, second)| {
                let sound = mean(chunk.iter().map(|s| s.sound))?;
                let light = mean(chunk.iter().map(|s| s.light))?;
                Some(FrequencyBucket {
                    second,
                    sound: round_to(sound, 1),
                    light: (light / LIGHT_CHART_SCALE).round(),
                    label: format!("{second}s"),
                })
            })
            .collect()
    }
}
