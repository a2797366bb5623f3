//! Conversation state tracker
//!
//! Single mutable object per call: rolling window of final segments, the
//! MEDDIC map, and the generation counter used to invalidate stale
//! in-flight work. Exactly one writer (the pipeline driver) mutates it;
//! Tier 2/3 readers take deep-copied snapshots at dispatch time, so no
//! lock guards the state itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use call_coach_core::{MeddicField, MeddicMap, PreCallBrief, Speaker, TranscriptSegment};

/// Immutable snapshot of conversation state, tagged with the generation it
/// was taken at.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub generation: u64,
    pub window: Vec<TranscriptSegment>,
    pub meddic: MeddicMap,
    pub brief: PreCallBrief,
}

impl StateSnapshot {
    /// The last `n` turns before the newest segment, as (speaker, text)
    /// pairs for prompt building.
    pub fn context_turns(&self, n: usize) -> Vec<(Speaker, String)> {
        let end = self.window.len().saturating_sub(1);
        let start = end.saturating_sub(n);
        self.window[start..end]
            .iter()
            .map(|s| (s.speaker, s.text.clone()))
            .collect()
    }

    /// The full window as (speaker, text) pairs
    pub fn full_transcript(&self) -> Vec<(Speaker, String)> {
        self.window
            .iter()
            .map(|s| (s.speaker, s.text.clone()))
            .collect()
    }

    /// The newest segment in the window, if any
    pub fn newest(&self) -> Option<&TranscriptSegment> {
        self.window.last()
    }
}

/// Per-call conversation state
pub struct StateTracker {
    window: VecDeque<TranscriptSegment>,
    window_size: usize,
    meddic: MeddicMap,
    brief: PreCallBrief,
    generation: u64,
    /// Generation mirror readable by in-flight tier tasks for staleness
    /// checks without touching the tracker itself
    shared_generation: Arc<AtomicU64>,
}

impl StateTracker {
    /// Create a tracker seeded from the pre-call brief
    pub fn new(brief: PreCallBrief, window_size: usize) -> Self {
        let mut meddic = MeddicMap::new();
        for (field, note) in &brief.meddic_seeds {
            meddic.mark_complete(*field, note.clone());
        }

        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            meddic,
            brief,
            generation: 0,
            shared_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a final segment. Called exactly once per final segment,
    /// before any tier snapshot for that segment is taken. Increments the
    /// generation counter.
    pub fn update(&mut self, segment: &TranscriptSegment) {
        debug_assert!(segment.is_final, "only final segments feed state");

        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(segment.clone());

        self.generation += 1;
        self.shared_generation.store(self.generation, Ordering::SeqCst);
    }

    /// Apply a MEDDIC field-update hint from Tier 1 or a Tier 2/3 result.
    /// Returns true if the field flipped from incomplete to complete.
    pub fn apply_hint(&mut self, field: MeddicField, note: impl Into<String>) -> bool {
        let flipped = self.meddic.mark_complete(field, note);
        if flipped {
            tracing::debug!(field = field.display_name(), "meddic field completed");
        }
        flipped
    }

    /// Deep-copied snapshot tagged with the current generation
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            generation: self.generation,
            window: self.window.iter().cloned().collect(),
            meddic: self.meddic.clone(),
            brief: self.brief.clone(),
        }
    }

    /// MEDDIC completion as a percentage for display
    pub fn meddic_completion(&self) -> f32 {
        self.meddic.completion_pct()
    }

    /// Read-only view of the MEDDIC map for Tier 1
    pub fn meddic(&self) -> &MeddicMap {
        &self.meddic
    }

    /// Current generation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Shared generation mirror handed to tier tasks
    pub fn shared_generation(&self) -> Arc<AtomicU64> {
        self.shared_generation.clone()
    }

    /// Pre-call brief
    pub fn brief(&self) -> &PreCallBrief {
        &self.brief
    }

    /// Number of final segments currently in the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
