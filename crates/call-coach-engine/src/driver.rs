//! Pipeline driver
//!
//! Wires one call: normalize -> state update -> Tier 1 inline ->
//! aggregator -> Tier 2/3 dispatch. The driver owns the conversation
//! state (single writer); everything asynchronous reaches the state only
//! through deep snapshots and the hint channel drained here.

use std::sync::Arc;

use call_coach_config::Settings;
use call_coach_core::{PreCallBrief, RawTranscript, TranscriptSegment};
use call_coach_llm::LanguageModel;
use call_coach_patterns::PatternMatcher;
use tokio::sync::{broadcast, mpsc};

use crate::aggregator::SuggestionAggregator;
use crate::normalizer::SegmentNormalizer;
use crate::scheduler::{FieldHint, TierScheduler};
use crate::sink::{DeliveryEvent, DeliverySink};
use crate::state::StateTracker;
use crate::EngineError;

/// Per-call counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStats {
    /// Segments accepted by the normalizer (interim + final)
    pub segments_ingested: u64,
    /// Final segments that updated state
    pub final_segments: u64,
    /// Malformed payloads dropped
    pub segments_dropped: u64,
    /// Suggestions delivered per tier rank (index 0 = Tier 1)
    pub delivered_by_tier: [u64; 3],
}

/// One live call's coaching pipeline
pub struct CoachPipeline {
    settings: Settings,
    normalizer: SegmentNormalizer,
    matcher: PatternMatcher,
    state: StateTracker,
    aggregator: Arc<SuggestionAggregator>,
    sink: DeliverySink,
    scheduler: TierScheduler,
    hints_rx: mpsc::UnboundedReceiver<FieldHint>,
    segments_ingested: u64,
    final_segments: u64,
    segments_dropped: u64,
    ended: bool,
}

impl CoachPipeline {
    /// Wire a pipeline for one call. Must be called within a tokio
    /// runtime; Tier 2 and Tier 3 may be backed by different models.
    pub fn new(
        brief: PreCallBrief,
        settings: Settings,
        tier2_llm: Arc<dyn LanguageModel>,
        tier3_llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let sink = DeliverySink::new(settings.engine.event_capacity);
        let aggregator = Arc::new(SuggestionAggregator::new(
            settings.engine.display_window,
            sink.clone(),
        ));

        let mut matcher = PatternMatcher::new();
        matcher.set_anticipated_objections(brief.anticipated_objections.clone());

        let state = StateTracker::new(brief, settings.engine.window_size);

        let (scheduler, hints_rx) = TierScheduler::new(
            settings.tiers.clone(),
            settings.engine.max_generation_lag,
            tier2_llm,
            tier3_llm,
            aggregator.clone(),
            sink.clone(),
            state.shared_generation(),
        );

        Ok(Self {
            settings,
            normalizer: SegmentNormalizer::new(),
            matcher,
            state,
            aggregator,
            sink,
            scheduler,
            hints_rx,
            segments_ingested: 0,
            final_segments: 0,
            segments_dropped: 0,
            ended: false,
        })
    }

    /// Subscribe to the delivery stream from now
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.sink.subscribe()
    }

    /// Feed one raw provider payload through the pipeline.
    ///
    /// State mutation for a final segment always completes before any
    /// Tier 2/3 dispatch takes a snapshot that includes it.
    pub fn ingest(&mut self, raw: RawTranscript) -> Result<(), EngineError> {
        if self.ended {
            return Err(EngineError::CallEnded("segment after call end".to_string()));
        }

        // Field hints from earlier async results are applied here, on the
        // single-writer path, before this segment is processed.
        self.drain_hints();

        let segment = match self.normalizer.normalize(raw) {
            Ok(segment) => segment,
            Err(e) => {
                self.segments_dropped += 1;
                tracing::warn!(error = %e, "dropping malformed segment");
                return Ok(());
            }
        };
        self.segments_ingested += 1;

        if !segment.is_final {
            if self.settings.engine.tier1_on_interim {
                self.run_tier1(&segment, false);
            }
            return Ok(());
        }

        // 1. State mutation, exactly once per final segment
        self.state.update(&segment);
        self.final_segments += 1;

        // 2. Tier 1 inline, bounded cost
        self.run_tier1(&segment, true);

        // 3. Qualification progress for the display surface
        self.publish_meddic();

        // 4. Tier 2/3 against a snapshot that includes this segment
        let snapshot = self.state.snapshot();
        self.scheduler.dispatch_tier2(snapshot.clone());
        self.scheduler.dispatch_tier3(snapshot);

        Ok(())
    }

    /// End the call: cancel in-flight work cooperatively and close the
    /// stream with a final event.
    pub fn end_call(&mut self, reason: impl Into<String>) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.drain_hints();
        self.scheduler.shutdown();
        self.sink.publish(DeliveryEvent::CallEnded { reason: reason.into() });
        tracing::info!("call ended");
    }

    /// MEDDIC completion as a percentage
    pub fn meddic_completion(&self) -> f32 {
        self.state.meddic_completion()
    }

    /// Whether Tier 3 has been disabled by the circuit breaker
    pub fn tier3_disabled(&self) -> bool {
        self.scheduler.tier3_disabled()
    }

    /// Current live suggestion window, newest first
    pub fn live_suggestions(&self) -> Vec<call_coach_core::Suggestion> {
        self.aggregator.live_window()
    }

    /// Per-call counters
    pub fn stats(&self) -> CallStats {
        CallStats {
            segments_ingested: self.segments_ingested,
            final_segments: self.final_segments,
            segments_dropped: self.segments_dropped,
            delivered_by_tier: self.aggregator.delivered_by_tier(),
        }
    }

    fn run_tier1(&mut self, segment: &TranscriptSegment, apply_hints: bool) {
        let Some(hit) = self.matcher.match_segment(segment, self.state.meddic()) else {
            return;
        };

        // Interim hits may be wrong about qualification; only final
        // segments flip fields.
        if apply_hints {
            if let Some(field) = hit.addressed_field {
                self.state.apply_hint(field, segment.text.clone());
            }
        }

        self.aggregator.ingest(hit.suggestion);
    }

    fn drain_hints(&mut self) {
        let mut flipped = false;
        while let Ok((field, note)) = self.hints_rx.try_recv() {
            flipped |= self.state.apply_hint(field, note);
        }
        if flipped {
            self.publish_meddic();
        }
    }

    fn publish_meddic(&self) {
        self.sink.publish(DeliveryEvent::MeddicUpdate {
            completion_pct: self.state.meddic_completion(),
            map: self.state.meddic().clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_coach_llm::MockLanguageModel;

    fn pipeline() -> CoachPipeline {
        let tier2 = Arc::new(MockLanguageModel::new().with_fallback("NO_SUGGESTION"));
        let tier3 = Arc::new(MockLanguageModel::new().with_fallback("NO_SUGGESTION"));
        CoachPipeline::new(
            PreCallBrief::new("Acme Corp"),
            Settings::default(),
            tier2,
            tier3,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped_not_fatal() {
        let mut pipeline = pipeline();

        pipeline
            .ingest(RawTranscript::new("   ", "prospect", true))
            .unwrap();
        pipeline
            .ingest(RawTranscript::new("real speech", "prospect", true))
            .unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.segments_dropped, 1);
        assert_eq!(stats.final_segments, 1);
    }

    #[tokio::test]
    async fn test_interim_segments_do_not_update_state() {
        let mut pipeline = pipeline();

        pipeline
            .ingest(RawTranscript::new("we keep missing our", "prospect", false))
            .unwrap();
        pipeline
            .ingest(RawTranscript::new("we keep missing our targets", "prospect", true))
            .unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.segments_ingested, 2);
        assert_eq!(stats.final_segments, 1);
    }

    #[tokio::test]
    async fn test_ingest_after_end_is_rejected() {
        let mut pipeline = pipeline();
        pipeline.end_call("done");

        let result = pipeline.ingest(RawTranscript::new("anything", "prospect", true));
        assert!(matches!(result, Err(EngineError::CallEnded(_))));
    }

    #[tokio::test]
    async fn test_end_call_emits_final_event() {
        let mut pipeline = pipeline();
        let mut rx = pipeline.subscribe();

        pipeline.end_call("rep hung up");

        let mut saw_ended = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DeliveryEvent::CallEnded { .. }) {
                saw_ended = true;
            }
        }
        assert!(saw_ended);

        // Idempotent
        pipeline.end_call("again");
    }
}
