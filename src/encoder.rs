//! Measurement record encoding
//!
//! Wraps a [`MeasurementResult`] with identity, producer and location metadata
//! into the record handed to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VibeError;
use crate::indicator::{classify, VibeIndicator};
use crate::presets::{compare_to_expected, ExpectationReport, LocationType};
use crate::types::MeasurementResult;
use crate::{PRODUCER_NAME, VERSION};

/// Current record schema version
pub const RECORD_VERSION: &str = "1.0.0";

/// Engine that produced a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Who measured where
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementTarget {
    pub user_id: String,
    /// None when the measurement creates a new location
    pub location_id: Option<String>,
    pub location_type: Option<LocationType>,
    pub city: Option<String>,
}

impl MeasurementTarget {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn at_location(mut self, location_id: impl Into<String>, location_type: LocationType) -> Self {
        self.location_id = Some(location_id.into());
        self.location_type = Some(location_type);
        self
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

/// Persisted form of one measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub record_version: String,
    pub id: Uuid,
    pub producer: Producer,
    pub target: MeasurementTarget,
    pub indicator: VibeIndicator,
    /// Present when the location type is known
    pub expectation: Option<ExpectationReport>,
    pub encoded_at: DateTime<Utc>,
    pub result: MeasurementResult,
}

/// Encoder for measurement records
pub struct MeasurementEncoder {
    instance_id: String,
}

impl Default for MeasurementEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a result for `target` under a fresh record id
    pub fn encode(&self, result: &MeasurementResult, target: &MeasurementTarget) -> MeasurementRecord {
        MeasurementRecord {
            record_version: RECORD_VERSION.to_string(),
            id: Uuid::new_v4(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            target: target.clone(),
            indicator: classify(result.vibe_score),
            expectation: target
                .location_type
                .map(|location_type| compare_to_expected(result, location_type)),
            encoded_at: Utc::now(),
            result: result.clone(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        result: &MeasurementResult,
        target: &MeasurementTarget,
    ) -> Result<String, VibeError> {
        let record = self.encode(result, target);
        serde_json::to_string_pretty(&record).map_err(VibeError::JsonError)
    }
}
