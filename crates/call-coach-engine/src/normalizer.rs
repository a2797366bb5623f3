//! Segment normalizer
//!
//! Turns raw provider payloads into canonical [`TranscriptSegment`]s with
//! locally assigned monotonic ids. Malformed payloads are rejected; the
//! driver logs and drops them without halting the pipeline.

use std::time::Instant;

use call_coach_core::{CoreError, RawTranscript, Speaker, TranscriptSegment};

/// Assigns per-call monotonic segment ids and normalizes provider payloads
#[derive(Debug)]
pub struct SegmentNormalizer {
    next_id: u64,
}

impl SegmentNormalizer {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Normalize a raw payload. Empty or whitespace-only text is rejected:
    /// no suggestion is emitted and no state is updated for it.
    pub fn normalize(&mut self, raw: RawTranscript) -> Result<TranscriptSegment, CoreError> {
        if raw.text.trim().is_empty() {
            return Err(CoreError::Input("empty transcript text".to_string()));
        }

        let provider_time_ms = raw.timestamp.as_ref().and_then(parse_provider_time);

        let segment = TranscriptSegment {
            segment_id: self.next_id,
            speaker: Speaker::from_label(&raw.speaker_label),
            text: raw.text.trim().to_string(),
            is_final: raw.is_final,
            received_at: Instant::now(),
            provider_time_ms,
        };
        self.next_id += 1;

        Ok(segment)
    }
}

impl Default for SegmentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort parse of a provider timestamp into epoch milliseconds.
/// Vendors disagree on the shape; anything unparseable is ignored since
/// ordering always uses the local segment id.
fn parse_provider_time(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                Some(ms)
            } else {
                // Fractional epoch seconds
                n.as_f64().map(|secs| (secs * 1000.0) as i64)
            }
        }
        serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}
