//! Real-sensor acquisition
//!
//! Platform collaborators (microphone, ambient light, accelerometer) are plugged
//! in as trait objects. Any channel that is missing or fails on a tick is filled
//! from the simulation for that tick only, so a run never stalls on hardware.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::simulated::SimulatedSource;
use super::SampleSource;
use crate::types::{Motion, Sample};

/// Lower end of the microphone dB mapping
const MIC_FLOOR_DB: f64 = 30.0;
/// Span of the microphone dB mapping
const MIC_SPAN_DB: f64 = 70.0;

/// Failure reading a platform sensor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Microphone exposing a byte frequency spectrum (0-255 per bin)
#[async_trait]
pub trait AudioInput: Send {
    async fn spectrum(&mut self) -> Result<Vec<u8>, SensorError>;
}

/// Ambient light sensor
#[async_trait]
pub trait LightSensor: Send {
    /// Illuminance in lux
    async fn illuminance(&mut self) -> Result<f64, SensorError>;
}

/// 3-axis accelerometer
#[async_trait]
pub trait Accelerometer: Send {
    async fn acceleration(&mut self) -> Result<Motion, SensorError>;
}

/// Map a byte spectrum onto the [30, 100] dB range by its mean bin energy
pub fn spectrum_to_db(spectrum: &[u8]) -> Option<f64> {
    if spectrum.is_empty() {
        return None;
    }
    let sum: u64 = spectrum.iter().map(|&b| u64::from(b)).sum();
    let average = sum as f64 / spectrum.len() as f64;
    Some(MIC_FLOOR_DB + (average / 255.0) * MIC_SPAN_DB)
}

/// Sample source reading platform sensors
pub struct SensorSource {
    audio: Option<Box<dyn AudioInput>>,
    light: Option<Box<dyn LightSensor>>,
    accelerometer: Option<Box<dyn Accelerometer>>,
    fallback: SimulatedSource,
}

impl Default for SensorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource {
    /// No sensors attached; every tick is simulated
    pub fn new() -> Self {
        Self {
            audio: None,
            light: None,
            accelerometer: None,
            fallback: SimulatedSource::new(),
        }
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioInput>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_light(mut self, light: Box<dyn LightSensor>) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_accelerometer(mut self, accelerometer: Box<dyn Accelerometer>) -> Self {
        self.accelerometer = Some(accelerometer);
        self
    }

    /// Replace the simulation used for missing readings
    pub fn with_fallback(mut self, fallback: SimulatedSource) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether any platform sensor is attached
    pub fn has_sensors(&self) -> bool {
        self.audio.is_some() || self.light.is_some() || self.accelerometer.is_some()
    }
}

#[async_trait]
impl SampleSource for SensorSource {
    async fn next_sample(&mut self, _previous: Option<&Sample>) -> Sample {
        let mut sample = self.fallback.sample_now();

        match self.audio.as_mut() {
            Some(audio) => match audio.spectrum().await.map(|s| spectrum_to_db(&s)) {
                Ok(Some(db)) => sample.sound = db,
                Ok(None) => debug!("empty audio spectrum, using simulated sound"),
                Err(e) => warn!(error = %e, "audio sensor failed, using simulated sound"),
            },
            None => debug!("no audio sensor attached"),
        }

        match self.light.as_mut() {
            Some(light) => match light.illuminance().await {
                Ok(lux) if lux.is_finite() && lux >= 0.0 => sample.light = lux,
                Ok(lux) => warn!(lux, "light sensor returned an invalid reading"),
                Err(e) => warn!(error = %e, "light sensor failed, using simulated light"),
            },
            None => debug!("no light sensor attached"),
        }

        match self.accelerometer.as_mut() {
            Some(accelerometer) => match accelerometer.acceleration().await {
                Ok(motion) => sample.motion = motion,
                Err(e) => warn!(error = %e, "accelerometer failed, using simulated motion"),
            },
            None => debug!("no accelerometer attached"),
        }

        sample
    }
}
