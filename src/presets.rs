//! Location presets
//!
//! Each location type carries its own expected sound, light and stability bands.
//! Types without a dedicated preset use the cafe bands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VibeError;
use crate::types::{MeasurementResult, OptimalRanges, TargetRange};

/// Kind of place being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Cafe,
    Library,
    Office,
    Park,
    Home,
    Coworking,
    Restaurant,
    Other,
}

impl LocationType {
    pub const ALL: [LocationType; 8] = [
        LocationType::Cafe,
        LocationType::Library,
        LocationType::Office,
        LocationType::Park,
        LocationType::Home,
        LocationType::Coworking,
        LocationType::Restaurant,
        LocationType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Cafe => "cafe",
            LocationType::Library => "library",
            LocationType::Office => "office",
            LocationType::Park => "park",
            LocationType::Home => "home",
            LocationType::Coworking => "coworking",
            LocationType::Restaurant => "restaurant",
            LocationType::Other => "other",
        }
    }

    /// Expected bands for this location type
    pub fn preset(&self) -> OptimalRanges {
        let (sound, light, stability) = match self {
            LocationType::Library => ((30.0, 45.0), (350.0, 550.0), (80.0, 95.0)),
            LocationType::Office => ((40.0, 55.0), (400.0, 600.0), (75.0, 90.0)),
            LocationType::Park => ((50.0, 70.0), (500.0, 2000.0), (50.0, 80.0)),
            LocationType::Home => ((35.0, 50.0), (200.0, 400.0), (85.0, 98.0)),
            LocationType::Cafe
            | LocationType::Coworking
            | LocationType::Restaurant
            | LocationType::Other => ((45.0, 65.0), (250.0, 450.0), (60.0, 85.0)),
        };
        OptimalRanges {
            sound: TargetRange::new(sound.0, sound.1),
            light: TargetRange::new(light.0, light.1),
            stability: TargetRange::new(stability.0, stability.1),
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LocationType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VibeError::ParseError(format!("unknown location type: {s}")))
    }
}

/// Actual vs. expected reading for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionComparison {
    pub actual: f64,
    /// Expected band as "min-max"
    pub expected: String,
    pub in_range: bool,
}

impl DimensionComparison {
    fn new(actual: f64, range: &TargetRange) -> Self {
        Self {
            actual,
            expected: format!("{}-{}", range.min, range.max),
            in_range: range.contains(actual),
        }
    }
}

/// How a measurement compares to the expectations for its location type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationReport {
    pub location_type: LocationType,
    pub sound: DimensionComparison,
    pub light: DimensionComparison,
    pub stability: DimensionComparison,
}

impl ExpectationReport {
    /// Number of dimensions inside their expected band
    pub fn matches(&self) -> usize {
        [&self.sound, &self.light, &self.stability]
            .iter()
            .filter(|c| c.in_range)
            .count()
    }
}

/// Compare a result's raw readings to the preset bands of `location_type`
pub fn compare_to_expected(
    result: &MeasurementResult,
    location_type: LocationType,
) -> ExpectationReport {
    let preset = location_type.preset();
    ExpectationReport {
        location_type,
        sound: DimensionComparison::new(result.sound_db, &preset.sound),
        light: DimensionComparison::new(result.light_lux, &preset.light),
        stability: DimensionComparison::new(result.stability_percent, &preset.stability),
    }
}
