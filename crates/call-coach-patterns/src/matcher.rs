//! Tier 1 pattern matcher
//!
//! Pure with respect to its library: reads the segment text and the MEDDIC
//! map, never mutates state, never does I/O. Runs inline on the ingestion
//! path.

use call_coach_core::{
    MeddicField, MeddicMap, SourceTier, Speaker, Suggestion, SuggestionCategory, TranscriptSegment,
};

use crate::library::{default_library, PatternEntry, SpeakerScope};

/// Confidence boost applied when a matched objection was anticipated in
/// the pre-call brief.
const ANTICIPATED_BOOST: f32 = 0.1;

/// A Tier 1 hit: the merged suggestion plus the MEDDIC field the winning
/// pattern tagged as addressed, if any. The matcher never mutates state;
/// the driver applies the hint.
#[derive(Debug, Clone)]
pub struct PatternHit {
    pub suggestion: Suggestion,
    pub addressed_field: Option<MeddicField>,
}

/// Rule-based matcher over an ordered pattern library
pub struct PatternMatcher {
    library: Vec<PatternEntry>,
    anticipated_objections: Vec<String>,
}

impl PatternMatcher {
    /// Create a matcher with the default library
    pub fn new() -> Self {
        Self::with_library(default_library())
    }

    /// Create a matcher with a custom library
    pub fn with_library(library: Vec<PatternEntry>) -> Self {
        Self {
            library,
            anticipated_objections: Vec::new(),
        }
    }

    /// Load anticipated objections from the pre-call brief. Matching
    /// objection hits get a confidence boost.
    pub fn set_anticipated_objections(&mut self, phrases: Vec<String>) {
        self.anticipated_objections = phrases
            .into_iter()
            .map(|p| p.to_lowercase())
            .collect();
    }

    /// Scan a segment against the library.
    ///
    /// Multiple pattern hits for one segment are pre-merged into a single
    /// ranked candidate: first-match-wins per category bucket, then the
    /// highest-priority category wins overall. Empty library or no match
    /// returns `None`, not an error.
    pub fn match_segment(
        &self,
        segment: &TranscriptSegment,
        meddic: &MeddicMap,
    ) -> Option<PatternHit> {
        if segment.is_empty() {
            return None;
        }

        let text_lower = segment.text.to_lowercase();

        // First match per category bucket
        let mut buckets: Vec<&PatternEntry> = Vec::new();
        for entry in &self.library {
            if !scope_allows(entry.scope, segment.speaker) {
                continue;
            }
            if buckets.iter().any(|e| e.category == entry.category) {
                continue;
            }
            if entry.matches(&text_lower) {
                buckets.push(entry);
            }
        }

        // Highest-priority category wins across buckets
        let winner = buckets
            .into_iter()
            .max_by_key(|e| e.category.priority())?;

        tracing::debug!(
            pattern = %winner.name,
            segment_id = segment.segment_id,
            "tier1 pattern hit"
        );

        let mut confidence = winner.confidence;
        if winner.category == SuggestionCategory::Objection && self.was_anticipated(&text_lower) {
            confidence = (confidence + ANTICIPATED_BOOST).min(1.0);
        }

        // Discovery templates target the first incomplete MEDDIC field so
        // the rep is nudged toward what is actually missing.
        let text = if winner.category == SuggestionCategory::Discovery {
            match meddic.first_incomplete() {
                Some(field) if winner.meddic_hint != Some(field) => {
                    format!("{} {}", winner.template, field.discovery_question())
                }
                _ => winner.template.clone(),
            }
        } else {
            winner.template.clone()
        };

        let mut suggestion = Suggestion::new(
            SourceTier::PatternMatch,
            segment.segment_id,
            winner.category,
            winner.urgency,
            confidence,
            text,
        );
        if let Some(framework) = &winner.framework {
            suggestion = suggestion.with_framework(framework.clone());
        }

        Some(PatternHit {
            suggestion,
            addressed_field: winner.meddic_hint,
        })
    }

    fn was_anticipated(&self, text_lower: &str) -> bool {
        self.anticipated_objections.iter().any(|phrase| {
            text_lower.contains(phrase.as_str())
                || phrase
                    .split_whitespace()
                    .any(|word| word.len() > 3 && text_lower.contains(word))
        })
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn scope_allows(scope: SpeakerScope, speaker: Speaker) -> bool {
    match scope {
        SpeakerScope::Any => true,
        SpeakerScope::Counterpart => speaker == Speaker::Counterpart,
        SpeakerScope::SalesRep => speaker == Speaker::SalesRep,
    }
}
