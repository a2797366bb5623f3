//! Real-time tactical suggestion engine
//!
//! Receives speaker-tagged transcript segments, races three suggestion
//! tiers against individual latency budgets, tracks MEDDIC qualification
//! state, merges and deduplicates tier output, and streams ranked
//! suggestions to subscribers while new speech keeps arriving.
//!
//! One [`CoachPipeline`] instance models one live call. Multiple
//! simultaneous calls require one independent pipeline each; no mutable
//! state is shared across calls.

pub mod aggregator;
pub mod driver;
pub mod normalizer;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use aggregator::{IngestOutcome, SuggestionAggregator};
pub use driver::{CallStats, CoachPipeline};
pub use normalizer::SegmentNormalizer;
pub use scheduler::TierScheduler;
pub use sink::{DeliveryEvent, DeliverySink};
pub use state::{StateSnapshot, StateTracker};

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Core error: {0}")]
    Core(#[from] call_coach_core::CoreError),

    #[error("Config error: {0}")]
    Config(#[from] call_coach_config::ConfigError),

    #[error("Call has ended: {0}")]
    CallEnded(String),
}
