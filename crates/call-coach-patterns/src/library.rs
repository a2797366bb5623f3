//! Pattern library
//!
//! Ordered list of (predicate, template) entries scanned by the Tier 1
//! matcher. Predicates are case-insensitive keyword/phrase membership
//! tests, optionally conditioned on speaker. Confidence is static per
//! template; patterns are deterministic, not probabilistic.

use call_coach_core::{MeddicField, SuggestionCategory, Urgency};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Which speaker a pattern applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerScope {
    /// Only counterpart speech (objection handling, buying signals)
    Counterpart,
    /// Only the rep's own speech (self-coaching nudges)
    SalesRep,
    /// Either speaker
    Any,
}

/// One pattern entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Short name for logging
    pub name: String,

    /// Case-insensitive phrases; any substring hit triggers the entry
    pub keywords: Vec<String>,

    /// Speaker the entry listens to
    pub scope: SpeakerScope,

    /// Category of the produced suggestion
    pub category: SuggestionCategory,

    /// Display urgency
    pub urgency: Urgency,

    /// Static confidence for this template
    pub confidence: f32,

    /// Sales framework the tactic comes from
    pub framework: Option<String>,

    /// Coaching text surfaced to the rep
    pub template: String,

    /// MEDDIC field this pattern tags as addressed when it fires
    pub meddic_hint: Option<MeddicField>,
}

impl PatternEntry {
    fn new(
        name: &str,
        keywords: &[&str],
        scope: SpeakerScope,
        category: SuggestionCategory,
        urgency: Urgency,
        confidence: f32,
        template: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            scope,
            category,
            urgency,
            confidence,
            framework: None,
            template: template.to_string(),
            meddic_hint: None,
        }
    }

    fn framework(mut self, framework: &str) -> Self {
        self.framework = Some(framework.to_string());
        self
    }

    fn meddic(mut self, field: MeddicField) -> Self {
        self.meddic_hint = Some(field);
        self
    }

    /// Does this entry match the given lowercased text?
    pub fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|k| text_lower.contains(k.as_str()))
    }
}

static DEFAULT_LIBRARY: Lazy<Vec<PatternEntry>> = Lazy::new(build_default_library);

/// The default pattern library.
///
/// Entries are ordered; within a category bucket the first match wins, so
/// more specific phrasings come before broad ones.
pub fn default_library() -> Vec<PatternEntry> {
    DEFAULT_LIBRARY.clone()
}

fn build_default_library() -> Vec<PatternEntry> {
    vec![
        // --- Objections (counterpart only) ---
        PatternEntry::new(
            "price_objection",
            &["how much", "cost", "price", "expensive", "too much money", "budget for this"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Objection,
            Urgency::High,
            0.9,
            "Don't quote yet. Anchor on value first: \"Before we talk numbers, can I ask what solving this would be worth to your team?\"",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::Metrics),
        PatternEntry::new(
            "competitor_objection",
            &["already use", "we use ", "other vendor", "competitor", "happy with our current"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Objection,
            Urgency::High,
            0.85,
            "Don't attack the incumbent. Ask: \"What would have to be true for a switch to even be worth considering?\"",
        )
        .framework("Chris Voss"),
        PatternEntry::new(
            "timing_objection",
            &["not a priority", "next quarter", "too busy", "bad time", "maybe later", "not right now"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Objection,
            Urgency::Medium,
            0.8,
            "Label it: \"It sounds like the timing feels wrong.\" Then ask what would make it the right time.",
        )
        .framework("Chris Voss"),
        PatternEntry::new(
            "authority_objection",
            &["ask my boss", "run it by", "not my call", "above my pay grade", "need approval"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Objection,
            Urgency::Medium,
            0.8,
            "The economic buyer just surfaced. Ask: \"Who would ultimately sign off, and what would they need to see?\"",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::EconomicBuyer),
        // --- Buying signals (counterpart only) ---
        PatternEntry::new(
            "implementation_signal",
            &["how soon", "how long would it take", "when could we", "onboarding", "implementation"],
            SpeakerScope::Counterpart,
            SuggestionCategory::BuyingSignal,
            Urgency::High,
            0.85,
            "They're picturing rollout. Confirm the timeline and ask what would need to happen on their side to hit it.",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::DecisionProcess),
        PatternEntry::new(
            "trial_signal",
            &["trial", "pilot", "proof of concept", "try it out", "demo for the team"],
            SpeakerScope::Counterpart,
            SuggestionCategory::BuyingSignal,
            Urgency::High,
            0.85,
            "Strong signal. Scope a pilot with success criteria: \"What would the pilot need to show for this to move forward?\"",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::DecisionCriteria),
        PatternEntry::new(
            "contract_signal",
            &["contract", "terms", "pricing tiers", "what would it take"],
            SpeakerScope::Counterpart,
            SuggestionCategory::BuyingSignal,
            Urgency::Medium,
            0.8,
            "They're asking about specifics. Summarize the value they agreed to before walking through terms.",
        ),
        // --- Stalls (counterpart only) ---
        PatternEntry::new(
            "brochure_stall",
            &["send me some information", "send over some material", "email me the details"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Stall,
            Urgency::Medium,
            0.8,
            "Classic deferral. Agree, then ask: \"Happy to. What specifically should it cover so it's actually useful to you?\"",
        )
        .framework("Sandler"),
        PatternEntry::new(
            "think_it_over_stall",
            &["think about it", "think it over", "circle back", "get back to you", "follow up later"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Stall,
            Urgency::Medium,
            0.8,
            "Surface the real hesitation: \"Usually when someone says that, something specific is giving them pause. What is it here?\"",
        )
        .framework("Sandler"),
        // --- Closing moments (counterpart only) ---
        PatternEntry::new(
            "agreement_close",
            &["sounds good", "makes sense", "we're interested", "ready to move", "let's do it"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Closing,
            Urgency::High,
            0.85,
            "They're leaning in. Propose a concrete next step with a date, not an open-ended follow-up.",
        ),
        // --- Pain / qualification (counterpart only) ---
        PatternEntry::new(
            "pain_surfaced",
            &["frustrating", "painful", "struggling", "biggest problem", "wastes so much", "manual process"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Discovery,
            Urgency::Medium,
            0.75,
            "Pain just surfaced. Quantify it: \"How often does that happen, and what does it cost you when it does?\"",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::Pain),
        PatternEntry::new(
            "metrics_surfaced",
            &["we measure", "our kpi", "roi", "metric we track", "targets this quarter"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Discovery,
            Urgency::Low,
            0.7,
            "They just told you how they keep score. Tie every capability you mention back to that number.",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::Metrics),
        PatternEntry::new(
            "champion_surfaced",
            &["i've been pushing for", "i want this to happen", "i'll advocate", "i can get the team"],
            SpeakerScope::Counterpart,
            SuggestionCategory::Discovery,
            Urgency::Low,
            0.7,
            "You may have a champion. Arm them: offer material they can share internally.",
        )
        .framework("MEDDIC")
        .meddic(MeddicField::Champion),
        // --- Self-coaching nudges (rep only) ---
        PatternEntry::new(
            "closed_question_nudge",
            &["do you ", "did you ", "is it ", "are you ", "have you ", "would you say yes"],
            SpeakerScope::SalesRep,
            SuggestionCategory::Discovery,
            Urgency::Low,
            0.6,
            "That was a closed question. Reopen it: \"How...\" or \"What...\" gets them talking.",
        )
        .framework("SPIN"),
        PatternEntry::new(
            "monologue_nudge",
            &["and another thing", "also we offer", "on top of that we"],
            SpeakerScope::SalesRep,
            SuggestionCategory::Discovery,
            Urgency::Low,
            0.55,
            "Feature-dumping. Pause and hand the conversation back with a question.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_library_not_empty() {
        let library = default_library();
        assert!(library.len() >= 10);
    }

    #[test]
    fn test_entry_matching_is_substring_based() {
        let library = default_library();
        let price = library.iter().find(|e| e.name == "price_objection").unwrap();

        assert!(price.matches("so how much does this cost?"));
        assert!(price.matches("that seems expensive to me"));
        assert!(!price.matches("tell me about the integration"));
    }

    #[test]
    fn test_objection_entries_listen_to_counterpart_only() {
        for entry in default_library() {
            if entry.category == SuggestionCategory::Objection {
                assert_eq!(entry.scope, SpeakerScope::Counterpart, "{}", entry.name);
            }
        }
    }

    #[test]
    fn test_price_objection_references_qualification_framework() {
        let library = default_library();
        let price = library.iter().find(|e| e.name == "price_objection").unwrap();
        assert_eq!(price.framework.as_deref(), Some("MEDDIC"));
    }
}
