//! Run analysis
//!
//! Reduces a completed sample buffer to a [`MeasurementResult`]: dimension scores
//! against the target bands, the weighted vibe score, the comfort rating and the
//! charting series. Averaging happens on unrounded values; rounding is applied
//! once, when the result is built.

use chrono::{DateTime, Utc};

use crate::error::VibeError;
use crate::features::FeatureDeriver;
use crate::normalizer::{round_to, to_score, Normalizer};
use crate::presets::LocationType;
use crate::types::{MeasurementResult, OptimalRanges, Sample, DEFAULT_DURATION_SECONDS};

/// Weight of each sub-score in the vibe score, in tenths
const SOUND_WEIGHT: u32 = 4;
const LIGHT_WEIGHT: u32 = 3;
const STABILITY_WEIGHT: u32 = 3;

/// Weighted composite of three 0-100 sub-scores, rounded half up.
///
/// Integer arithmetic keeps `round(0.4*s + 0.3*l + 0.3*t)` exact at .5 ties.
pub fn vibe_score(sound_score: u8, light_score: u8, stability_score: u8) -> u8 {
    let weighted = SOUND_WEIGHT * u32::from(sound_score)
        + LIGHT_WEIGHT * u32::from(light_score)
        + STABILITY_WEIGHT * u32::from(stability_score);
    ((weighted + 5) / 10).min(100) as u8
}

/// Comfort rating (1-10) for a vibe score
pub fn comfort_rating(vibe_score: u8) -> u8 {
    ((u32::from(vibe_score) + 5) / 10).clamp(1, 10) as u8
}

/// Scores sample buffers against a set of target bands
#[derive(Debug, Clone, Copy)]
pub struct AnalysisProcessor {
    ranges: OptimalRanges,
    duration_seconds: u32,
}

impl Default for AnalysisProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_SECONDS)
    }
}

impl AnalysisProcessor {
    /// Processor for a run of `duration_seconds` using the default bands
    pub fn new(duration_seconds: u32) -> Self {
        Self {
            ranges: OptimalRanges::default(),
            duration_seconds,
        }
    }

    /// Score against custom bands
    pub fn with_ranges(mut self, ranges: OptimalRanges) -> Self {
        self.ranges = ranges;
        self
    }

    /// Score against the preset bands of a location type
    pub fn for_location(self, location_type: LocationType) -> Self {
        self.with_ranges(location_type.preset())
    }

    pub fn ranges(&self) -> &OptimalRanges {
        &self.ranges
    }

    /// Analyze a sample buffer, stamping the result with the current time
    pub fn analyze(&self, samples: &[Sample]) -> Result<MeasurementResult, VibeError> {
        self.analyze_at(samples, Utc::now())
    }

    /// Analyze a sample buffer with an explicit creation time
    pub fn analyze_at(
        &self,
        samples: &[Sample],
        created_at: DateTime<Utc>,
    ) -> Result<MeasurementResult, VibeError> {
        let features = FeatureDeriver::derive(samples).ok_or(VibeError::EmptySampleBuffer)?;

        let sound_score = to_score(Normalizer::dimension_score(
            features.avg_sound,
            &self.ranges.sound,
        ));
        let light_score = to_score(Normalizer::dimension_score(
            features.avg_light,
            &self.ranges.light,
        ));
        let stability_score = to_score(features.stability_percent);
        let vibe = vibe_score(sound_score, light_score, stability_score);

        Ok(MeasurementResult {
            sound_db: round_to(features.avg_sound, 1),
            light_lux: features.avg_light.round(),
            stability_percent: round_to(features.stability_percent, 1),
            sound_score,
            light_score,
            stability_score,
            vibe_score: vibe,
            comfort_rating: comfort_rating(vibe),
            frequency_data: FeatureDeriver::frequency_series(samples, self.duration_seconds),
            duration_seconds: self.duration_seconds,
            sample_count: samples.len(),
            created_at,
        })
    }
}

/// Analyze a run of `duration_seconds` against the default bands.
pub fn analyze(samples: &[Sample], duration_seconds: u32) -> Result<MeasurementResult, VibeError> {
    AnalysisProcessor::new(duration_seconds).analyze(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{SampleSource, SimulatedSource};
    use crate::types::{Motion, TargetRange, GRAVITY};
    use pretty_assertions::assert_eq;

    fn steady(sound: f64, light: f64, count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample {
                timestamp: i as i64 * 100,
                sound,
                light,
                motion: Motion::at_rest(),
            })
            .collect()
    }

    #[test]
    fn test_perfect_environment() {
        let result = analyze(&steady(50.0, 400.0, 170), 17).unwrap();

        assert_eq!(result.sound_score, 100);
        assert_eq!(result.light_score, 100);
        assert_eq!(result.stability_score, 100);
        assert_eq!(result.stability_percent, 100.0);
        assert_eq!(result.vibe_score, 100);
        assert_eq!(result.comfort_rating, 10);
        assert_eq!(result.sample_count, 170);
        assert_eq!(result.duration_seconds, 17);
        assert_eq!(result.frequency_data.len(), 17);
    }

    #[test]
    fn test_band_edge_scores() {
        // sound at band edge (60 dB) scores 50, light at 2x tolerance (600 lux) scores 0
        let result = analyze(&steady(60.0, 600.0, 170), 17).unwrap();
        assert_eq!(result.sound_score, 50);
        assert_eq!(result.light_score, 0);
        // 0.4*50 + 0.3*0 + 0.3*100 = 50
        assert_eq!(result.vibe_score, 50);
        assert_eq!(result.comfort_rating, 5);
    }

    #[test]
    fn test_raw_readings_are_rounded() {
        let mut samples = steady(50.04, 400.4, 2);
        samples[1].sound = 50.08;
        samples[1].light = 400.8;
        let result = analyze(&samples, 17).unwrap();
        // mean 50.06 -> 50.1, mean 400.6 -> 401
        assert_eq!(result.sound_db, 50.1);
        assert_eq!(result.light_lux, 401.0);
    }

    #[test]
    fn test_unstable_run() {
        let samples: Vec<Sample> = (0..170)
            .map(|i| Sample {
                timestamp: i,
                sound: 50.0,
                light: 400.0,
                motion: if i % 2 == 0 {
                    Motion::at_rest()
                } else {
                    Motion::new(0.0, 0.0, GRAVITY + 3.0)
                },
            })
            .collect();
        let result = analyze(&samples, 17).unwrap();
        assert_eq!(result.stability_percent, 0.0);
        assert_eq!(result.stability_score, 0);
        // 0.4*100 + 0.3*100 + 0 = 70
        assert_eq!(result.vibe_score, 70);
    }

    #[test]
    fn test_empty_buffer_is_error() {
        assert!(matches!(analyze(&[], 17), Err(VibeError::EmptySampleBuffer)));
    }

    #[test]
    fn test_vibe_score_invariant_over_grid() {
        for sound in (0..=100u8).step_by(7) {
            for light in (0..=100u8).step_by(11) {
                for stability in (0..=100u8).step_by(13) {
                    let weighted =
                        4 * u32::from(sound) + 3 * u32::from(light) + 3 * u32::from(stability);
                    let expected = ((weighted + 5) / 10) as u8;
                    assert_eq!(vibe_score(sound, light, stability), expected);
                }
            }
        }
        assert_eq!(vibe_score(100, 100, 100), 100);
        assert_eq!(vibe_score(0, 0, 0), 0);
        // 0.4*1 + 0.3*0 + 0.3*1 = 0.7 -> 1
        assert_eq!(vibe_score(1, 0, 1), 1);
    }

    #[test]
    fn test_comfort_rating_clamped() {
        assert_eq!(comfort_rating(0), 1);
        assert_eq!(comfort_rating(4), 1);
        assert_eq!(comfort_rating(14), 1);
        assert_eq!(comfort_rating(15), 2);
        assert_eq!(comfort_rating(94), 9);
        assert_eq!(comfort_rating(95), 10);
        assert_eq!(comfort_rating(100), 10);
    }

    #[test]
    fn test_custom_ranges() {
        let processor = AnalysisProcessor::new(17).with_ranges(OptimalRanges {
            sound: TargetRange::new(30.0, 45.0),
            ..Default::default()
        });
        let result = processor.analyze(&steady(37.5, 400.0, 170)).unwrap();
        assert_eq!(result.sound_score, 100);
    }

    #[test]
    fn test_location_preset_changes_scoring() {
        let samples = steady(37.5, 450.0, 170);
        let default = AnalysisProcessor::new(17).analyze(&samples).unwrap();
        let library = AnalysisProcessor::new(17)
            .for_location(LocationType::Library)
            .analyze(&samples)
            .unwrap();
        assert_eq!(library.sound_score, 100);
        assert!(default.sound_score < library.sound_score);
    }

    #[tokio::test]
    async fn test_simulated_runs_stay_in_bounds() {
        for seed in 0..20u64 {
            let mut source = SimulatedSource::seeded(seed);
            let mut samples = Vec::new();
            for _ in 0..170 {
                let sample = source.next_sample(samples.last()).await;
                samples.push(sample);
            }
            let result = analyze(&samples, 17).unwrap();
            assert!(result.sound_score <= 100);
            assert!(result.light_score <= 100);
            assert!(result.stability_score <= 100);
            assert!(result.vibe_score <= 100);
            assert!((1..=10).contains(&result.comfort_rating));
            assert_eq!(result.frequency_data.len(), 17);
        }
    }
}
