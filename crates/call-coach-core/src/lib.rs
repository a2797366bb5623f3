//! Core traits and types for the call coaching engine
//!
//! This crate provides foundational types used across all other crates:
//! - Transcript segment types
//! - Suggestion types and rankings
//! - MEDDIC qualification tracking types
//! - Error types

pub mod error;
pub mod meddic;
pub mod segment;
pub mod suggestion;

pub use error::{CoreError, Result};
pub use meddic::{MeddicField, MeddicMap, PreCallBrief};
pub use segment::{RawTranscript, Speaker, TranscriptSegment};
pub use suggestion::{SourceTier, Suggestion, SuggestionCategory, Urgency};
