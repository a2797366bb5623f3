//! Tier 2/3 scheduling
//!
//! Tier 2 dispatches on every final segment as an independent task with a
//! hard deadline. Tier 3 is single-flight per call: at most one request in
//! flight, with newer final segments coalesced into a one-slot pending
//! dispatch that carries the latest snapshot. Results are checked for
//! staleness against the live generation counter before acceptance, and
//! consecutive Tier 3 service errors trip a per-call circuit breaker.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use call_coach_config::TierSettings;
use call_coach_core::{MeddicField, SourceTier, Suggestion, SuggestionCategory, Urgency};
use call_coach_llm::{
    build_reframe_prompt, build_strategic_prompt, parse_generation, GenerateRequest, LanguageModel,
    LlmError,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use crate::aggregator::SuggestionAggregator;
use crate::sink::{DeliveryEvent, DeliverySink};
use crate::state::StateSnapshot;

/// Static confidence for accepted Tier 2 results
const TIER2_CONFIDENCE: f32 = 0.7;
/// Static confidence for accepted Tier 3 results
const TIER3_CONFIDENCE: f32 = 0.8;

/// A MEDDIC field-update hint extracted from a generation result, routed
/// back to the single-writer driver.
pub type FieldHint = (MeddicField, String);

/// Shared pieces every tier task needs to accept or discard a result
#[derive(Clone)]
struct TierContext {
    aggregator: Arc<SuggestionAggregator>,
    sink: DeliverySink,
    hints_tx: mpsc::UnboundedSender<FieldHint>,
    live_generation: Arc<AtomicU64>,
    max_generation_lag: u64,
    shutdown: Arc<AtomicBool>,
}

impl TierContext {
    /// Apply the acceptance rules to a completed generation: shutdown and
    /// staleness guards first, then marker parsing, then ingestion.
    fn accept(
        &self,
        tier: SourceTier,
        segment_id: u64,
        dispatched_generation: u64,
        raw_text: &str,
        meddic_complete: bool,
    ) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let live = self.live_generation.load(Ordering::SeqCst);
        let lag = live.saturating_sub(dispatched_generation);
        if lag > self.max_generation_lag {
            // The conversation has moved on; showing this now would be
            // advice for a topic already left behind.
            tracing::debug!(
                tier = tier.display_name(),
                segment_id,
                lag,
                "stale result discarded"
            );
            return;
        }

        let parsed = parse_generation(raw_text);

        for field in &parsed.field_updates {
            let _ = self.hints_tx.send((*field, String::new()));
        }

        if parsed.declined {
            return;
        }

        let category = parsed.category.unwrap_or(match tier {
            SourceTier::StrategicAnalysis if meddic_complete => SuggestionCategory::Closing,
            SourceTier::StrategicAnalysis => SuggestionCategory::Discovery,
            _ => SuggestionCategory::Reframe,
        });

        let urgency = match category {
            SuggestionCategory::Objection | SuggestionCategory::Closing => Urgency::High,
            _ => Urgency::Medium,
        };

        let confidence = match tier {
            SourceTier::StrategicAnalysis => TIER3_CONFIDENCE,
            _ => TIER2_CONFIDENCE,
        };

        let mut suggestion =
            Suggestion::new(tier, segment_id, category, urgency, confidence, parsed.text);
        if tier == SourceTier::StrategicAnalysis {
            suggestion = suggestion.with_framework("MEDDIC");
        }

        self.aggregator.ingest(suggestion);
    }
}

/// Tier 3 single-flight state: one pending slot plus the breaker
struct Tier3Shared {
    pending: Mutex<Option<StateSnapshot>>,
    notify: Notify,
    consecutive_failures: AtomicU32,
    breaker_open: AtomicBool,
}

/// Schedules Tier 2/3 generation for one call
pub struct TierScheduler {
    settings: TierSettings,
    tier2_llm: Arc<dyn LanguageModel>,
    ctx: TierContext,
    tier3: Arc<Tier3Shared>,
    shutdown: Arc<AtomicBool>,
}

impl TierScheduler {
    /// Create a scheduler and spawn the Tier 3 worker. Must be called
    /// within a tokio runtime. Returns the scheduler and the receiver for
    /// MEDDIC field-update hints, which the driver drains.
    pub fn new(
        settings: TierSettings,
        max_generation_lag: u64,
        tier2_llm: Arc<dyn LanguageModel>,
        tier3_llm: Arc<dyn LanguageModel>,
        aggregator: Arc<SuggestionAggregator>,
        sink: DeliverySink,
        live_generation: Arc<AtomicU64>,
    ) -> (Self, mpsc::UnboundedReceiver<FieldHint>) {
        let (hints_tx, hints_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let ctx = TierContext {
            aggregator,
            sink,
            hints_tx,
            live_generation,
            max_generation_lag,
            shutdown: shutdown.clone(),
        };

        let tier3 = Arc::new(Tier3Shared {
            pending: Mutex::new(None),
            notify: Notify::new(),
            consecutive_failures: AtomicU32::new(0),
            breaker_open: AtomicBool::new(false),
        });

        tokio::spawn(tier3_worker(
            tier3_llm,
            ctx.clone(),
            tier3.clone(),
            settings.clone(),
        ));

        let scheduler = Self {
            settings,
            tier2_llm,
            ctx,
            tier3,
            shutdown,
        };
        (scheduler, hints_rx)
    }

    /// Dispatch a Tier 2 generation for the newest segment in the
    /// snapshot. Every final segment gets one.
    pub fn dispatch_tier2(&self, snapshot: StateSnapshot) {
        let Some(segment) = snapshot.newest().cloned() else {
            return;
        };

        let llm = self.tier2_llm.clone();
        let ctx = self.ctx.clone();
        let budget = Duration::from_millis(self.settings.tier2_budget_ms);
        let context_turns = self.settings.tier2_context_turns;
        let max_tokens = self.settings.max_tokens;
        let temperature = self.settings.temperature;

        tokio::spawn(async move {
            let turns = snapshot.context_turns(context_turns);
            let request = GenerateRequest {
                messages: build_reframe_prompt(&segment.text, segment.speaker, &turns),
                max_tokens: Some(max_tokens),
                temperature: Some(temperature),
            };

            match timeout(budget, llm.generate(request)).await {
                Err(_) => {
                    tracing::debug!(segment_id = segment.segment_id, "tier2 deadline expired");
                }
                Ok(Err(e)) => {
                    tracing::warn!(segment_id = segment.segment_id, error = %e, "tier2 generation failed");
                }
                Ok(Ok(response)) => {
                    let meddic_complete = snapshot.meddic.first_incomplete().is_none();
                    ctx.accept(
                        SourceTier::ContextualReframe,
                        segment.segment_id,
                        snapshot.generation,
                        &response.text,
                        meddic_complete,
                    );
                }
            }
        });
    }

    /// Request a Tier 3 generation. If one is already in flight the
    /// snapshot replaces any pending dispatch (coalescing: intermediate
    /// segments fold into the next run rather than each triggering their
    /// own request).
    pub fn dispatch_tier3(&self, snapshot: StateSnapshot) {
        if self.tier3.breaker_open.load(Ordering::SeqCst) {
            tracing::debug!("tier3 disabled for this call; dispatch skipped");
            return;
        }

        *self.tier3.pending.lock() = Some(snapshot);
        self.tier3.notify.notify_one();
    }

    /// Whether the Tier 3 circuit breaker has tripped
    pub fn tier3_disabled(&self) -> bool {
        self.tier3.breaker_open.load(Ordering::SeqCst)
    }

    /// Cooperative cancellation of in-flight and future work
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.tier3.notify.notify_one();
    }
}

/// Single-flight Tier 3 worker: runs pending dispatches one at a time,
/// always taking the latest snapshot from the coalescing slot.
async fn tier3_worker(
    llm: Arc<dyn LanguageModel>,
    ctx: TierContext,
    shared: Arc<Tier3Shared>,
    settings: TierSettings,
) {
    let budget = Duration::from_millis(settings.tier3_budget_ms);

    loop {
        shared.notify.notified().await;
        if ctx.shutdown.load(Ordering::SeqCst) {
            return;
        }

        loop {
            let Some(snapshot) = shared.pending.lock().take() else {
                break;
            };
            if ctx.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if shared.breaker_open.load(Ordering::SeqCst) {
                break;
            }
            let Some(segment) = snapshot.newest().cloned() else {
                continue;
            };

            let request = GenerateRequest {
                messages: build_strategic_prompt(
                    &snapshot.full_transcript(),
                    &snapshot.meddic,
                    &snapshot.brief,
                ),
                max_tokens: Some(settings.max_tokens),
                temperature: Some(settings.temperature),
            };

            match timeout(budget, llm.generate(request)).await {
                // Deadline expiry, ours or the backend's, is "no
                // suggestion", not an error; it neither counts toward nor
                // resets the breaker.
                Err(_) | Ok(Err(LlmError::Timeout)) => {
                    tracing::debug!(segment_id = segment.segment_id, "tier3 deadline expired");
                }
                Ok(Err(e)) => {
                    let failures = shared.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::warn!(
                        segment_id = segment.segment_id,
                        failures,
                        error = %e,
                        "tier3 generation failed"
                    );

                    if failures >= settings.tier3_failure_threshold
                        && !shared.breaker_open.swap(true, Ordering::SeqCst)
                    {
                        tracing::warn!("tier3 disabled for remainder of call");
                        ctx.sink.publish(DeliveryEvent::TierDegraded {
                            tier: SourceTier::StrategicAnalysis,
                            reason: format!(
                                "disabled after {} consecutive generation failures",
                                failures
                            ),
                        });
                    }
                }
                Ok(Ok(response)) => {
                    shared.consecutive_failures.store(0, Ordering::SeqCst);
                    let meddic_complete = snapshot.meddic.first_incomplete().is_none();
                    ctx.accept(
                        SourceTier::StrategicAnalysis,
                        segment.segment_id,
                        snapshot.generation,
                        &response.text,
                        meddic_complete,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_coach_core::{PreCallBrief, Speaker, TranscriptSegment};
    use call_coach_llm::{MockLanguageModel, ScriptedReply};
    use std::time::Instant;

    fn snapshot(generation: u64, segment_id: u64, text: &str) -> StateSnapshot {
        StateSnapshot {
            generation,
            window: vec![TranscriptSegment {
                segment_id,
                speaker: Speaker::Counterpart,
                text: text.to_string(),
                is_final: true,
                received_at: Instant::now(),
                provider_time_ms: None,
            }],
            meddic: Default::default(),
            brief: PreCallBrief::new("Acme Corp"),
        }
    }

    struct Harness {
        scheduler: TierScheduler,
        aggregator: Arc<SuggestionAggregator>,
        sink: DeliverySink,
        tier2: Arc<MockLanguageModel>,
        tier3: Arc<MockLanguageModel>,
        live_generation: Arc<AtomicU64>,
        _hints_rx: mpsc::UnboundedReceiver<FieldHint>,
    }

    fn harness(settings: TierSettings) -> Harness {
        let sink = DeliverySink::new(64);
        let aggregator = Arc::new(SuggestionAggregator::new(10, sink.clone()));
        let tier2 = Arc::new(MockLanguageModel::new());
        let tier3 = Arc::new(MockLanguageModel::new());
        let live_generation = Arc::new(AtomicU64::new(0));

        let (scheduler, hints_rx) = TierScheduler::new(
            settings,
            3,
            tier2.clone(),
            tier3.clone(),
            aggregator.clone(),
            sink.clone(),
            live_generation.clone(),
        );

        Harness {
            scheduler,
            aggregator,
            sink,
            tier2,
            tier3,
            live_generation,
            _hints_rx: hints_rx,
        }
    }

    fn fast_settings() -> TierSettings {
        TierSettings {
            tier2_budget_ms: 100,
            tier3_budget_ms: 200,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_tier2_result_reaches_aggregator() {
        let h = harness(fast_settings());
        h.tier2.push_text("[CATEGORY: reframe] Mirror their last three words.");

        h.live_generation.store(1, Ordering::SeqCst);
        h.scheduler.dispatch_tier2(snapshot(1, 5, "we are drowning in spreadsheets"));

        tokio::time::sleep(Duration::from_millis(50)).await;

        let live = h.aggregator.live_window();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].source_tier, SourceTier::ContextualReframe);
        assert_eq!(live[0].segment_id, 5);
        assert_eq!(live[0].category, SuggestionCategory::Reframe);
    }

    #[tokio::test]
    async fn test_tier2_deadline_yields_no_suggestion() {
        let h = harness(fast_settings());
        h.tier2.push(ScriptedReply::Delayed(
            "too late to matter".to_string(),
            Duration::from_millis(300),
        ));

        h.scheduler.dispatch_tier2(snapshot(1, 5, "anything"));
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(h.aggregator.live_window().is_empty());
    }

    #[tokio::test]
    async fn test_tier3_single_flight_with_coalescing() {
        let h = harness(fast_settings());
        // First call is slow enough that two more dispatches arrive
        // while it is in flight; they must coalesce into one follow-up.
        h.tier3.push(ScriptedReply::Delayed(
            "NO_SUGGESTION".to_string(),
            Duration::from_millis(60),
        ));
        h.tier3.push_text("NO_SUGGESTION");
        h.tier3.push_text("NO_SUGGESTION");

        h.scheduler.dispatch_tier3(snapshot(1, 1, "first"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.scheduler.dispatch_tier3(snapshot(2, 2, "second"));
        h.scheduler.dispatch_tier3(snapshot(3, 3, "third"));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(h.tier3.max_concurrent_calls(), 1);
        assert_eq!(h.tier3.call_count(), 2);
    }

    #[tokio::test]
    async fn test_tier3_deadline_allows_fresh_dispatch() {
        let h = harness(fast_settings());
        h.tier3.push(ScriptedReply::Delayed(
            "missed the window".to_string(),
            Duration::from_millis(500),
        ));
        h.tier3.push_text("[CATEGORY: closing] Ask for the next meeting now.");

        h.scheduler.dispatch_tier3(snapshot(1, 1, "first"));
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Deadline passed, no suggestion for segment 1
        assert!(h.aggregator.live_window().is_empty());

        // A later segment can still dispatch fresh
        h.live_generation.store(2, Ordering::SeqCst);
        h.scheduler.dispatch_tier3(snapshot(2, 2, "second"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let live = h.aggregator.live_window();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].segment_id, 2);
        assert!(!h.scheduler.tier3_disabled());
    }

    #[tokio::test]
    async fn test_tier3_circuit_breaker_trips_once() {
        let h = harness(fast_settings());
        let mut rx = h.sink.subscribe();

        for _ in 0..3 {
            h.tier3.push_failure("upstream 503");
        }

        for generation in 1..=3 {
            h.scheduler.dispatch_tier3(snapshot(generation, generation, "text"));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert!(h.scheduler.tier3_disabled());
        assert_eq!(h.tier3.call_count(), 3);

        // A fourth dispatch never reaches the model
        h.scheduler.dispatch_tier3(snapshot(4, 4, "text"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.tier3.call_count(), 3);

        // The trip is reported exactly once
        let mut degraded = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DeliveryEvent::TierDegraded { .. }) {
                degraded += 1;
            }
        }
        assert_eq!(degraded, 1);
    }

    #[tokio::test]
    async fn test_success_resets_breaker_count() {
        let h = harness(fast_settings());

        h.tier3.push_failure("blip");
        h.tier3.push_failure("blip");
        h.tier3.push_text("NO_SUGGESTION");
        h.tier3.push_failure("blip");

        for generation in 1..=4 {
            h.scheduler.dispatch_tier3(snapshot(generation, generation, "text"));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        // Two failures, a success, one failure: never three consecutive
        assert!(!h.scheduler.tier3_disabled());
    }

    #[tokio::test]
    async fn test_stale_result_discarded() {
        let h = harness(fast_settings());
        h.tier2.push_text("advice for a topic long gone");

        // Dispatched at generation 1, but the conversation is at 10 by
        // the time the result lands (lag 9 > max 3).
        h.live_generation.store(10, Ordering::SeqCst);
        h.scheduler.dispatch_tier2(snapshot(1, 1, "old topic"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.aggregator.live_window().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_discards_results() {
        let h = harness(fast_settings());
        h.tier2.push(ScriptedReply::Delayed(
            "late arrival".to_string(),
            Duration::from_millis(40),
        ));

        h.scheduler.dispatch_tier2(snapshot(1, 1, "text"));
        h.scheduler.shutdown();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.aggregator.live_window().is_empty());
    }
}
