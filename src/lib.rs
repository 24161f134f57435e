//! Vibe Flux - On-device measurement, scoring and accrual engine for Vibe Rated
//!
//! Flux samples an environment (sound, light, motion) at a fixed cadence for a
//! fixed window and reduces the run into a scored result through a
//! deterministic pipeline: sampling → feature derivation → normalization
//! against target bands → weighted vibe score → comfort rating.
//!
//! ## Modules
//!
//! - **Measurement**: run a sampling session and score it ([`VibeAnalyzer`], [`analyze`])
//! - **Resonance**: turn scored results into vibrations, ranks and badges
//!   ([`calculate_points`], [`current_rank`], [`check_badges`], [`ResonanceProcessor`])

pub mod analyzer;
pub mod encoder;
pub mod error;
pub mod features;
pub mod indicator;
pub mod normalizer;
pub mod pipeline;
pub mod presets;
pub mod resonance;
pub mod sampler;
pub mod session;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analyzer::{analyze, AnalysisProcessor};
pub use encoder::{MeasurementEncoder, MeasurementRecord, MeasurementTarget};
pub use error::VibeError;
pub use indicator::{classify, VibeIndicator, VibeTier};
pub use pipeline::{evaluate_accrual, AccrualDelta, AccrualOutcome, ResonanceProcessor};
pub use presets::{compare_to_expected, LocationType};
pub use sampler::{SampleSource, SensorSource, SimulatedSource};
pub use session::{MeasurementObserver, MeasurementRun, StopHandle, VibeAnalyzer};
pub use store::{AccrualStore, InMemoryStore};
pub use types::{MeasurementConfig, MeasurementEvent, MeasurementResult, Sample};

// Resonance exports
pub use resonance::{
    calculate_points, check_badges, current_rank, detect_rank_up, format_vibrations,
    rank_progress, AccrualContext, UserAccrualState,
};

/// Flux version embedded in all measurement records
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for measurement records
pub const PRODUCER_NAME: &str = "vibe-flux";
