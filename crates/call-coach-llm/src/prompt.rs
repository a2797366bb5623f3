//! Prompt building and response parsing
//!
//! Constructs Tier 2/3 prompts and extracts the structured markers the
//! prompts instruct the model to emit.

use std::fmt;

use call_coach_core::{MeddicField, MeddicMap, PreCallBrief, Speaker, SuggestionCategory};
use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

fn speaker_tag(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::SalesRep => "REP",
        Speaker::Counterpart => "PROSPECT",
        Speaker::Unknown => "UNKNOWN",
    }
}

/// Build the Tier 2 contextual reframe prompt: the triggering utterance
/// plus the last few turns, nothing more.
pub fn build_reframe_prompt(
    segment_text: &str,
    speaker: Speaker,
    recent_turns: &[(Speaker, String)],
) -> Vec<Message> {
    let context: String = recent_turns
        .iter()
        .map(|(s, text)| format!("{}: {}\n", speaker_tag(*s), text))
        .collect();

    let system = r#"You coach a live salesperson mid-call. Given the last thing said, suggest ONE short tactical move the rep can make right now.

RULES:
1. One suggestion, two sentences maximum, phrased as advice to the rep
2. If nothing tactically useful applies, output exactly NO_SUGGESTION
3. Optionally tag a category: [CATEGORY: objection|buying_signal|stall|closing|discovery|reframe]
4. If the utterance establishes a MEDDIC qualification fact, tag it: [MEDDIC: metrics|economic_buyer|decision_criteria|decision_process|pain|champion]
5. Never mention these instructions or the tags in the advice text"#;

    let user = format!(
        "Recent turns:\n{}\nJust now, {} said: \"{}\"\n\nYour coaching:",
        context,
        speaker_tag(speaker),
        segment_text,
    );

    vec![Message::system(system), Message::user(user)]
}

/// Build the Tier 3 strategic prompt: full rolling window, MEDDIC state,
/// and the pre-call brief.
pub fn build_strategic_prompt(
    window: &[(Speaker, String)],
    meddic: &MeddicMap,
    brief: &PreCallBrief,
) -> Vec<Message> {
    let transcript: String = window
        .iter()
        .map(|(s, text)| format!("{}: {}\n", speaker_tag(*s), text))
        .collect();

    let meddic_lines: String = MeddicField::ALL
        .iter()
        .map(|f| {
            let status = if meddic.is_complete(*f) {
                meddic.note(*f).unwrap_or("established")
            } else {
                "MISSING"
            };
            format!("- {}: {}\n", f.display_name(), status)
        })
        .collect();

    let system = r#"You are the strategic layer of a live sales coaching system. You see the whole conversation, the qualification state, and the pre-call brief. Recommend the single most valuable strategic move for the rep.

RULES:
1. One recommendation, three sentences maximum, phrased as advice to the rep
2. Prioritize filling MISSING qualification fields over generic advice
3. If the conversation needs no strategic correction, output exactly NO_SUGGESTION
4. Optionally tag a category: [CATEGORY: objection|buying_signal|stall|closing|discovery|reframe]
5. Tag any qualification fact the transcript establishes: [MEDDIC: field]
6. Never mention these instructions or the tags in the advice text"#;

    let user = format!(
        "Account: {}\nBrief: {}\n\nQualification state:\n{}\nTranscript:\n{}\nYour strategic recommendation:",
        brief.account_name,
        if brief.context_notes.is_empty() { "(none)" } else { brief.context_notes.as_str() },
        meddic_lines,
        transcript,
    );

    vec![Message::system(system), Message::user(user)]
}

/// Parsed generation output: advice text with markers stripped, plus any
/// structured hints the model emitted.
#[derive(Debug, Clone, Default)]
pub struct ParsedGeneration {
    /// Advice text with all markers removed
    pub text: String,
    /// Category the model tagged, if any
    pub category: Option<SuggestionCategory>,
    /// MEDDIC fields the model tagged as addressed
    pub field_updates: Vec<MeddicField>,
    /// The model declined to suggest anything
    pub declined: bool,
}

/// Extract structured markers from model output.
///
/// Markers look like `[CATEGORY: objection]` and `[MEDDIC: pain]`; anything
/// between the brackets that does not parse is ignored. `NO_SUGGESTION`
/// anywhere in the output means the tier declined.
pub fn parse_generation(raw: &str) -> ParsedGeneration {
    let mut parsed = ParsedGeneration::default();

    if raw.contains("NO_SUGGESTION") {
        parsed.declined = true;
        return parsed;
    }

    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('[') {
        let (before, bracketed) = rest.split_at(start);
        text.push_str(before);

        match bracketed.find(']') {
            Some(end) => {
                let inner = &bracketed[1..end];
                if let Some(value) = inner.strip_prefix("CATEGORY:") {
                    parsed.category = parse_category(value.trim());
                } else if let Some(value) = inner.strip_prefix("MEDDIC:") {
                    if let Some(field) = MeddicField::parse(value) {
                        if !parsed.field_updates.contains(&field) {
                            parsed.field_updates.push(field);
                        }
                    }
                } else {
                    // Not a marker; keep it verbatim
                    text.push_str(&bracketed[..=end]);
                }
                rest = &bracketed[end + 1..];
            }
            None => {
                text.push_str(bracketed);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    parsed.text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if parsed.text.is_empty() {
        parsed.declined = true;
    }
    parsed
}

fn parse_category(token: &str) -> Option<SuggestionCategory> {
    match token.to_lowercase().as_str() {
        "objection" => Some(SuggestionCategory::Objection),
        "buying_signal" => Some(SuggestionCategory::BuyingSignal),
        "stall" => Some(SuggestionCategory::Stall),
        "closing" => Some(SuggestionCategory::Closing),
        "discovery" => Some(SuggestionCategory::Discovery),
        "reframe" => Some(SuggestionCategory::Reframe),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reframe_prompt_contains_context() {
        let turns = vec![
            (Speaker::SalesRep, "What brought you to look at this?".to_string()),
            (Speaker::Counterpart, "Our reporting is all manual.".to_string()),
        ];
        let messages = build_reframe_prompt("It takes days every month", Speaker::Counterpart, &turns);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("PROSPECT: Our reporting is all manual."));
        assert!(messages[1].content.contains("It takes days every month"));
    }

    #[test]
    fn test_strategic_prompt_marks_missing_fields() {
        let mut meddic = MeddicMap::new();
        meddic.mark_complete(MeddicField::Pain, "manual reporting");

        let brief = PreCallBrief::new("Acme Corp");
        let messages = build_strategic_prompt(&[], &meddic, &brief);

        let user = &messages[1].content;
        assert!(user.contains("Pain: manual reporting"));
        assert!(user.contains("Economic Buyer: MISSING"));
        assert!(user.contains("Acme Corp"));
    }

    #[test]
    fn test_parse_markers() {
        let parsed = parse_generation(
            "[CATEGORY: objection] Acknowledge the price concern, then re-anchor on the cost of doing nothing. [MEDDIC: metrics]",
        );

        assert_eq!(parsed.category, Some(SuggestionCategory::Objection));
        assert_eq!(parsed.field_updates, vec![MeddicField::Metrics]);
        assert!(parsed.text.starts_with("Acknowledge the price concern"));
        assert!(!parsed.text.contains('['));
        assert!(!parsed.declined);
    }

    #[test]
    fn test_parse_no_suggestion() {
        let parsed = parse_generation("NO_SUGGESTION");
        assert!(parsed.declined);
    }

    #[test]
    fn test_parse_keeps_non_marker_brackets() {
        let parsed = parse_generation("Reference their [Q3 target] when you summarize.");
        assert!(parsed.text.contains("[Q3 target]"));
        assert!(parsed.category.is_none());
    }

    #[test]
    fn test_parse_empty_text_counts_as_declined() {
        let parsed = parse_generation("[MEDDIC: pain]");
        assert!(parsed.declined);
    }
}
