//! Suggestion types
//!
//! A suggestion is one tactical prompt surfaced to the salesperson. It is
//! immutable once created; its lifecycle ends when it is evicted from the
//! aggregator's display window or the call ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which generation strategy produced a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Tier 1: synchronous rule-based pattern match
    PatternMatch,
    /// Tier 2: fast contextual reframe from a language model
    ContextualReframe,
    /// Tier 3: deep strategic analysis with full call context
    StrategicAnalysis,
}

impl SourceTier {
    /// Numeric rank used for supersession (3 > 2 > 1)
    pub fn rank(&self) -> u8 {
        match self {
            SourceTier::PatternMatch => 1,
            SourceTier::ContextualReframe => 2,
            SourceTier::StrategicAnalysis => 3,
        }
    }

    /// Get tier display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceTier::PatternMatch => "Pattern Match",
            SourceTier::ContextualReframe => "Contextual Reframe",
            SourceTier::StrategicAnalysis => "Strategic Analysis",
        }
    }
}

/// Tactical category of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    /// The counterpart pushed back; handle the objection
    Objection,
    /// The counterpart signaled interest; reinforce it
    BuyingSignal,
    /// The conversation is stalling; regain momentum
    Stall,
    /// The moment is right to ask for commitment
    Closing,
    /// Qualification information is missing; ask for it
    Discovery,
    /// Reframe what was just said to advance the conversation
    Reframe,
}

impl SuggestionCategory {
    /// Fixed priority order when multiple categories match the same
    /// segment: objection > buying_signal > stall > closing > discovery.
    /// Reframe is produced by Tier 2/3 only and sits below the rest.
    pub fn priority(&self) -> u8 {
        match self {
            SuggestionCategory::Objection => 5,
            SuggestionCategory::BuyingSignal => 4,
            SuggestionCategory::Stall => 3,
            SuggestionCategory::Closing => 2,
            SuggestionCategory::Discovery => 1,
            SuggestionCategory::Reframe => 0,
        }
    }

    /// Get category display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SuggestionCategory::Objection => "Objection",
            SuggestionCategory::BuyingSignal => "Buying Signal",
            SuggestionCategory::Stall => "Stall",
            SuggestionCategory::Closing => "Closing",
            SuggestionCategory::Discovery => "Discovery",
            SuggestionCategory::Reframe => "Reframe",
        }
    }
}

/// How urgently the suggestion should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// A tactical suggestion for the salesperson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Unique id; re-delivery of the same id is idempotent downstream
    pub suggestion_id: Uuid,

    /// Which tier produced this
    pub source_tier: SourceTier,

    /// The segment that triggered it
    pub segment_id: u64,

    /// Tactical category
    pub category: SuggestionCategory,

    /// Display urgency
    pub urgency: Urgency,

    /// Confidence score (0.0 - 1.0). Static per template for Tier 1,
    /// model-derived for Tiers 2/3.
    pub confidence: f32,

    /// The coaching text shown to the salesperson
    pub text: String,

    /// Sales framework the tactic comes from (e.g. "Chris Voss", "MEDDIC")
    pub framework: Option<String>,

    /// Wall-clock creation time, used for display ordering
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    /// Create a new suggestion with a fresh id
    pub fn new(
        source_tier: SourceTier,
        segment_id: u64,
        category: SuggestionCategory,
        urgency: Urgency,
        confidence: f32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            suggestion_id: Uuid::new_v4(),
            source_tier,
            segment_id,
            category,
            urgency,
            confidence: confidence.clamp(0.0, 1.0),
            text: text.into(),
            framework: None,
            created_at: Utc::now(),
        }
    }

    /// Set the originating framework
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    /// Key used by the aggregator for merge/dedup
    pub fn dedup_key(&self) -> (u64, SuggestionCategory) {
        (self.segment_id, self.category)
    }
}
