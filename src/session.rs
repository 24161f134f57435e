//! Measurement sessions
//!
//! [`VibeAnalyzer`] is a cheap, cloneable gate that admits one run at a time.
//! Each admitted run is a [`MeasurementRun`] that owns its sample buffer, its
//! source, its observer and its stop flag, so nothing leaks between runs.
//!
//! The loop is cooperative: acquire a sample, notify, then sleep for the
//! inter-sample interval. A stop request takes effect at the next loop boundary
//! and discards the buffer; no partial result is produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::analyzer::AnalysisProcessor;
use crate::error::VibeError;
use crate::presets::LocationType;
use crate::sampler::{SampleSource, SensorSource, SimulatedSource};
use crate::types::{MeasurementConfig, MeasurementEvent, MeasurementResult, ProgressUpdate, Sample};

/// Receives run notifications on the run's own task, between loop iterations
pub trait MeasurementObserver: Send {
    fn on_progress(&mut self, _update: &ProgressUpdate) {}

    fn on_complete(&mut self, _result: &MeasurementResult) {}
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl MeasurementObserver for NoopObserver {}

type ProgressCallback = Box<dyn FnMut(&ProgressUpdate) + Send>;
type CompleteCallback = Box<dyn FnMut(&MeasurementResult) + Send>;

/// Observer built from plain callbacks
#[derive(Default)]
pub struct CallbackObserver {
    progress: Option<ProgressCallback>,
    complete: Option<CompleteCallback>,
}

impl CallbackObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ProgressUpdate) + Send + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MeasurementResult) + Send + 'static,
    {
        self.complete = Some(Box::new(f));
        self
    }
}

impl MeasurementObserver for CallbackObserver {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        if let Some(f) = self.progress.as_mut() {
            f(update);
        }
    }

    fn on_complete(&mut self, result: &MeasurementResult) {
        if let Some(f) = self.complete.as_mut() {
            f(result);
        }
    }
}

/// Observer that republishes notifications on a tokio broadcast channel.
///
/// Subscribers that fall more than `capacity` events behind observe a lag.
#[derive(Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<MeasurementEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<MeasurementEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeasurementEvent> {
        self.tx.subscribe()
    }
}

impl MeasurementObserver for BroadcastObserver {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        // no subscribers is not an error
        let _ = self.tx.send(MeasurementEvent::Progress(update.clone()));
    }

    fn on_complete(&mut self, result: &MeasurementResult) {
        let _ = self.tx.send(MeasurementEvent::Complete(result.clone()));
    }
}

/// Cloneable handle used to stop a run from outside its task
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request the run to stop at its next loop boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Releases the analyzer gate when the run ends or is dropped
#[derive(Debug)]
struct ActiveGuard {
    active: Arc<AtomicBool>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Single-flight gate for measurement runs
#[derive(Debug, Clone, Default)]
pub struct VibeAnalyzer {
    active: Arc<AtomicBool>,
}

impl VibeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run currently holds the gate
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Admit a run using the source selected by `config.use_real_sensors`.
    ///
    /// Real-sensor mode without attached sensors simulates every tick.
    pub fn start(&self, config: MeasurementConfig) -> Result<MeasurementRun, VibeError> {
        let source: Box<dyn SampleSource> = if config.use_real_sensors {
            Box::new(SensorSource::new())
        } else {
            Box::new(SimulatedSource::new())
        };
        self.start_with_source(config, source)
    }

    /// Admit a run reading from `source`.
    ///
    /// Fails with [`VibeError::InvalidConfig`] before claiming the gate, and with
    /// [`VibeError::AlreadyRunning`] while another run holds it.
    pub fn start_with_source(
        &self,
        config: MeasurementConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<MeasurementRun, VibeError> {
        config.validate()?;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("measurement start ignored, a run is already active");
            return Err(VibeError::AlreadyRunning);
        }

        debug!(
            duration_seconds = config.duration_seconds,
            sample_rate = config.sample_rate,
            use_real_sensors = config.use_real_sensors,
            "measurement run admitted"
        );

        Ok(MeasurementRun {
            config,
            source,
            processor: AnalysisProcessor::new(config.duration_seconds),
            observer: Box::new(NoopObserver),
            stop: StopHandle::new(),
            samples: Vec::with_capacity(config.total_samples()),
            _guard: ActiveGuard {
                active: Arc::clone(&self.active),
            },
        })
    }

    /// Start, run to completion and return the result.
    ///
    /// `Ok(None)` when the run was stopped.
    pub async fn measure(
        &self,
        config: MeasurementConfig,
        observer: Box<dyn MeasurementObserver>,
    ) -> Result<Option<MeasurementResult>, VibeError> {
        self.start(config)?.with_observer(observer).execute().await
    }
}

/// One admitted measurement run
pub struct MeasurementRun {
    config: MeasurementConfig,
    source: Box<dyn SampleSource>,
    processor: AnalysisProcessor,
    observer: Box<dyn MeasurementObserver>,
    stop: StopHandle,
    samples: Vec<Sample>,
    _guard: ActiveGuard,
}

impl MeasurementRun {
    pub fn with_observer(mut self, observer: Box<dyn MeasurementObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Score against the preset bands of a location type
    pub fn for_location(mut self, location_type: LocationType) -> Self {
        self.processor = self.processor.for_location(location_type);
        self
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Drive the sampling loop to completion.
    ///
    /// Returns `Ok(None)` if a stop was requested before analysis.
    pub async fn execute(mut self) -> Result<Option<MeasurementResult>, VibeError> {
        let total = self.config.total_samples();
        let interval = Duration::from_millis(self.config.interval_ms());

        for i in 0..total {
            if !self.stop.is_running() {
                break;
            }

            let sample = self.source.next_sample(self.samples.last()).await;
            self.samples.push(sample);
            self.observer.on_progress(&ProgressUpdate::at(
                i,
                total,
                self.config.sample_rate,
                sample,
            ));

            tokio::time::sleep(interval).await;
        }

        if !self.stop.is_running() {
            debug!(
                collected = self.samples.len(),
                "measurement stopped, discarding samples"
            );
            return Ok(None);
        }
        self.stop.stop();

        let result = self.processor.analyze(&self.samples)?;
        info!(
            vibe_score = result.vibe_score,
            comfort_rating = result.comfort_rating,
            sample_count = result.sample_count,
            "measurement complete"
        );
        self.observer.on_complete(&result);
        Ok(Some(result))
    }
}
