//! Simulated environment
//!
//! Sound and light follow slow sine waves over the wall clock with uniform
//! jitter; motion is small noise around rest under gravity.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::SampleSource;
use crate::types::{Motion, Sample, GRAVITY};

/// Milliseconds since the Unix epoch
pub type Clock = fn() -> i64;

fn wall_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// Build one simulated sample for epoch millisecond `t`
pub fn simulated_sample<R: Rng + ?Sized>(t: i64, rng: &mut R) -> Sample {
    let ms = t as f64;
    let base_sound = 50.0 + 10.0 * (ms / 1000.0).sin();
    let base_light = 400.0 + 100.0 * (ms / 2000.0).sin();

    Sample {
        timestamp: t,
        sound: base_sound + rng.gen_range(-7.5..=7.5),
        light: base_light + rng.gen_range(-25.0..=25.0),
        motion: Motion {
            x: rng.gen_range(-0.1..=0.1),
            y: rng.gen_range(-0.1..=0.1),
            z: GRAVITY + rng.gen_range(-0.15..=0.15),
        },
    }
}

/// Sample source backed by the simulation formula
pub struct SimulatedSource {
    rng: StdRng,
    clock: Clock,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSource {
    /// Entropy-seeded source on the wall clock
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            clock: wall_clock,
        }
    }

    /// Reproducible noise on the wall clock
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock: wall_clock,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Produce a sample without suspending
    pub fn sample_now(&mut self) -> Sample {
        let t = (self.clock)();
        simulated_sample(t, &mut self.rng)
    }
}

#[async_trait]
impl SampleSource for SimulatedSource {
    async fn next_sample(&mut self, _previous: Option<&Sample>) -> Sample {
        self.sample_now()
    }
}
