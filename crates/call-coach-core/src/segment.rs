//! Transcript segment types
//!
//! A segment is one unit of transcribed speech, interim or final, tagged
//! with the speaker it was attributed to.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Who produced a segment of speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The salesperson being coached
    SalesRep,
    /// The prospect/customer on the other side of the call
    Counterpart,
    /// Diarization could not attribute the speech
    Unknown,
}

impl Speaker {
    /// Map a provider speaker label to a speaker. Labels vary by
    /// transcription vendor; matching is case-insensitive.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "rep" | "self" | "me" | "agent" | "sales_rep" | "salesrep" => Speaker::SalesRep,
            "customer" | "prospect" | "counterpart" | "them" | "caller" => Speaker::Counterpart,
            _ => Speaker::Unknown,
        }
    }
}

/// Raw transcript payload as delivered by a transcription provider.
///
/// The timestamp shape differs between vendors (epoch millis, RFC 3339
/// strings, fractional seconds) so it is carried as an untyped value and
/// parsed best-effort downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    /// Transcribed text
    pub text: String,

    /// Provider speaker label
    pub speaker_label: String,

    /// Is this a final result?
    pub is_final: bool,

    /// Provider timestamp, if any
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl RawTranscript {
    /// Create a raw payload with no provider timestamp
    pub fn new(text: impl Into<String>, speaker_label: impl Into<String>, is_final: bool) -> Self {
        Self {
            text: text.into(),
            speaker_label: speaker_label.into(),
            is_final,
            timestamp: None,
        }
    }

    /// Attach a provider timestamp
    pub fn with_timestamp(mut self, timestamp: serde_json::Value) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A normalized transcript segment. Immutable once created.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// Monotonic, per-call unique id assigned by the normalizer
    pub segment_id: u64,

    /// Attributed speaker
    pub speaker: Speaker,

    /// Transcribed text
    pub text: String,

    /// Final segments feed state tracking and Tier 2/3 generation;
    /// interim segments may only be consumed by Tier 1.
    pub is_final: bool,

    /// Local monotonic receipt time
    pub received_at: Instant,

    /// Provider wall-clock timestamp in epoch milliseconds, when one was
    /// supplied and parseable. Informational only; ordering always uses
    /// `segment_id`.
    pub provider_time_ms: Option<i64>,
}

impl TranscriptSegment {
    /// Check if the segment carries no usable text
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Get word count
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_labels() {
        assert_eq!(Speaker::from_label("Agent"), Speaker::SalesRep);
        assert_eq!(Speaker::from_label("me"), Speaker::SalesRep);
        assert_eq!(Speaker::from_label("PROSPECT"), Speaker::Counterpart);
        assert_eq!(Speaker::from_label("caller"), Speaker::Counterpart);
        assert_eq!(Speaker::from_label("speaker_2"), Speaker::Unknown);
    }

    #[test]
    fn test_segment_helpers() {
        let segment = TranscriptSegment {
            segment_id: 1,
            speaker: Speaker::Counterpart,
            text: "How much does this cost?".to_string(),
            is_final: true,
            received_at: Instant::now(),
            provider_time_ms: None,
        };

        assert!(!segment.is_empty());
        assert_eq!(segment.word_count(), 5);
    }
}
