//! Sample acquisition
//!
//! A run pulls one [`Sample`] per tick from a [`SampleSource`]. Simulated and
//! real-sensor sources sit behind the same contract so a run never needs to
//! know where its readings come from.
//!
//! - [`SimulatedSource`]: sine-wave baselines plus bounded uniform jitter
//! - [`SensorSource`]: platform sensors, degrading per channel to simulation

pub mod sensors;
pub mod simulated;

use async_trait::async_trait;

use crate::types::Sample;

pub use sensors::{Accelerometer, AudioInput, LightSensor, SensorError, SensorSource};
pub use simulated::{simulated_sample, SimulatedSource};

/// Strategy producing the next sample of a run.
///
/// Implementations must not fail: a source that cannot read hardware returns a
/// substitute reading instead. `previous` is the last sample of the current run.
#[async_trait]
pub trait SampleSource: Send {
    async fn next_sample(&mut self, previous: Option<&Sample>) -> Sample;
}

#[async_trait]
impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    async fn next_sample(&mut self, previous: Option<&Sample>) -> Sample {
        (**self).next_sample(previous).await
    }
}
