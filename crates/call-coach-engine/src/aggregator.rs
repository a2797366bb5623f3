//! Suggestion aggregator
//!
//! Merges tier output across time, deduplicates near-identical
//! suggestions, and forwards accepted items to the delivery sink. The
//! live window exposes only the K most recent suggestions,
//! reverse-chronological; eviction never retracts already-delivered items.

use std::collections::HashSet;

use call_coach_core::{Suggestion, SuggestionCategory};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::sink::{DeliveryEvent, DeliverySink};

/// What happened to an ingested suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New card in the live window, delivered
    Accepted,
    /// Replaced a lower-tier card for the same (segment, category),
    /// delivered
    Superseded,
    /// Same suggestion_id seen before; no-op
    Duplicate,
    /// A card for this (segment, category) already exists at an equal or
    /// higher tier; dropped
    Rejected,
}

struct AggregatorInner {
    /// Live display window, newest first
    live: Vec<Suggestion>,
    /// Every suggestion_id ever ingested this call
    seen: HashSet<Uuid>,
    /// Delivered counts indexed by tier rank - 1
    delivered_by_tier: [u64; 3],
}

/// Merge/dedup layer between the tiers and the delivery sink
pub struct SuggestionAggregator {
    inner: Mutex<AggregatorInner>,
    display_window: usize,
    sink: DeliverySink,
}

impl SuggestionAggregator {
    /// Create an aggregator bounded to `display_window` live suggestions
    pub fn new(display_window: usize, sink: DeliverySink) -> Self {
        Self {
            inner: Mutex::new(AggregatorInner {
                live: Vec::new(),
                seen: HashSet::new(),
                delivered_by_tier: [0; 3],
            }),
            display_window: display_window.max(1),
            sink,
        }
    }

    /// Ingest one suggestion from any tier.
    ///
    /// Two suggestions are duplicates when they share `segment_id` and
    /// `category`; the later, higher-tier one supersedes the earlier in
    /// the live window. Re-ingesting the same `suggestion_id` is
    /// idempotent.
    pub fn ingest(&self, suggestion: Suggestion) -> IngestOutcome {
        let outcome = {
            let mut inner = self.inner.lock();

            if !inner.seen.insert(suggestion.suggestion_id) {
                return IngestOutcome::Duplicate;
            }

            let key = suggestion.dedup_key();
            let existing = inner
                .live
                .iter()
                .position(|s| s.dedup_key() == key);

            let outcome = match existing {
                Some(idx) => {
                    if suggestion.source_tier.rank() > inner.live[idx].source_tier.rank() {
                        inner.live[idx] = suggestion.clone();
                        IngestOutcome::Superseded
                    } else {
                        return IngestOutcome::Rejected;
                    }
                }
                None => {
                    inner.live.push(suggestion.clone());
                    IngestOutcome::Accepted
                }
            };

            // Newest first; evict past the display bound
            inner.live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            inner.live.truncate(self.display_window);

            let tier_idx = (suggestion.source_tier.rank() - 1) as usize;
            inner.delivered_by_tier[tier_idx] += 1;
            outcome
        };

        tracing::debug!(
            segment_id = suggestion.segment_id,
            category = suggestion.category.display_name(),
            tier = suggestion.source_tier.display_name(),
            ?outcome,
            "suggestion ingested"
        );
        self.sink.publish(DeliveryEvent::Suggestion(suggestion));
        outcome
    }

    /// The current live window, newest first
    pub fn live_window(&self) -> Vec<Suggestion> {
        self.inner.lock().live.clone()
    }

    /// Live suggestions matching a (segment, category) key
    pub fn live_for(&self, segment_id: u64, category: SuggestionCategory) -> Vec<Suggestion> {
        self.inner
            .lock()
            .live
            .iter()
            .filter(|s| s.segment_id == segment_id && s.category == category)
            .cloned()
            .collect()
    }

    /// Delivered counts per tier rank (index 0 = Tier 1)
    pub fn delivered_by_tier(&self) -> [u64; 3] {
        self.inner.lock().delivered_by_tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_coach_core::{SourceTier, Urgency};

    fn sink() -> DeliverySink {
        DeliverySink::new(64)
    }

    fn suggestion(
        tier: SourceTier,
        segment_id: u64,
        category: SuggestionCategory,
    ) -> Suggestion {
        Suggestion::new(tier, segment_id, category, Urgency::Medium, 0.8, "advice")
    }

    #[test]
    fn test_accept_and_window_bound() {
        let aggregator = SuggestionAggregator::new(3, sink());

        for id in 1..=5 {
            let outcome = aggregator.ingest(suggestion(
                SourceTier::PatternMatch,
                id,
                SuggestionCategory::Discovery,
            ));
            assert_eq!(outcome, IngestOutcome::Accepted);
        }

        let live = aggregator.live_window();
        assert_eq!(live.len(), 3);
        // Reverse-chronological: the newest segment id first
        assert_eq!(live[0].segment_id, 5);
    }

    #[test]
    fn test_higher_tier_supersedes() {
        let aggregator = SuggestionAggregator::new(5, sink());

        aggregator.ingest(suggestion(SourceTier::PatternMatch, 1, SuggestionCategory::Objection));
        let outcome = aggregator.ingest(suggestion(
            SourceTier::ContextualReframe,
            1,
            SuggestionCategory::Objection,
        ));

        assert_eq!(outcome, IngestOutcome::Superseded);
        let live = aggregator.live_for(1, SuggestionCategory::Objection);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].source_tier, SourceTier::ContextualReframe);
    }

    #[test]
    fn test_lower_tier_does_not_supersede() {
        let aggregator = SuggestionAggregator::new(5, sink());

        aggregator.ingest(suggestion(
            SourceTier::StrategicAnalysis,
            1,
            SuggestionCategory::Objection,
        ));
        let outcome = aggregator.ingest(suggestion(
            SourceTier::PatternMatch,
            1,
            SuggestionCategory::Objection,
        ));

        assert_eq!(outcome, IngestOutcome::Rejected);
        let live = aggregator.live_for(1, SuggestionCategory::Objection);
        assert_eq!(live[0].source_tier, SourceTier::StrategicAnalysis);
    }

    #[test]
    fn test_same_id_is_idempotent() {
        let aggregator = SuggestionAggregator::new(5, sink());

        let s = suggestion(SourceTier::PatternMatch, 1, SuggestionCategory::Stall);
        assert_eq!(aggregator.ingest(s.clone()), IngestOutcome::Accepted);
        assert_eq!(aggregator.ingest(s), IngestOutcome::Duplicate);

        assert_eq!(aggregator.live_window().len(), 1);
    }

    #[test]
    fn test_different_categories_coexist_for_one_segment() {
        let aggregator = SuggestionAggregator::new(5, sink());

        aggregator.ingest(suggestion(SourceTier::PatternMatch, 1, SuggestionCategory::Objection));
        let outcome = aggregator.ingest(suggestion(
            SourceTier::ContextualReframe,
            1,
            SuggestionCategory::Reframe,
        ));

        assert_eq!(outcome, IngestOutcome::Accepted);
        assert_eq!(aggregator.live_window().len(), 2);
    }

    #[test]
    fn test_supersession_invariant_holds() {
        // At most one live suggestion per (segment_id, category) no matter
        // the ingest order.
        let aggregator = SuggestionAggregator::new(10, sink());

        aggregator.ingest(suggestion(SourceTier::PatternMatch, 7, SuggestionCategory::Objection));
        aggregator.ingest(suggestion(SourceTier::StrategicAnalysis, 7, SuggestionCategory::Objection));
        aggregator.ingest(suggestion(SourceTier::ContextualReframe, 7, SuggestionCategory::Objection));

        assert_eq!(aggregator.live_for(7, SuggestionCategory::Objection).len(), 1);
    }

    #[test]
    fn test_eviction_does_not_retract_delivery() {
        let sink = sink();
        let mut rx = sink.subscribe();
        let aggregator = SuggestionAggregator::new(1, sink);

        aggregator.ingest(suggestion(SourceTier::PatternMatch, 1, SuggestionCategory::Discovery));
        aggregator.ingest(suggestion(SourceTier::PatternMatch, 2, SuggestionCategory::Discovery));

        // Both were delivered even though the window only holds one
        let mut delivered = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DeliveryEvent::Suggestion(_)) {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 2);
        assert_eq!(aggregator.live_window().len(), 1);
    }
}
