//! MEDDIC qualification tracking types
//!
//! MEDDIC is tracked as six independent completion fields. Each field is a
//! one-way state machine: incomplete -> complete, never back. A human
//! correction path is out of scope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One of the six MEDDIC qualification fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeddicField {
    /// Quantifiable business impact
    Metrics,
    /// Who signs off on the spend
    EconomicBuyer,
    /// What the decision will be judged on
    DecisionCriteria,
    /// How the decision gets made
    DecisionProcess,
    /// The pain driving the evaluation
    Pain,
    /// The internal advocate
    Champion,
}

impl MeddicField {
    /// All six fields in canonical order
    pub const ALL: [MeddicField; 6] = [
        MeddicField::Metrics,
        MeddicField::EconomicBuyer,
        MeddicField::DecisionCriteria,
        MeddicField::DecisionProcess,
        MeddicField::Pain,
        MeddicField::Champion,
    ];

    /// Get field display name
    pub fn display_name(&self) -> &'static str {
        match self {
            MeddicField::Metrics => "Metrics",
            MeddicField::EconomicBuyer => "Economic Buyer",
            MeddicField::DecisionCriteria => "Decision Criteria",
            MeddicField::DecisionProcess => "Decision Process",
            MeddicField::Pain => "Pain",
            MeddicField::Champion => "Champion",
        }
    }

    /// Discovery question to ask while this field is incomplete
    pub fn discovery_question(&self) -> &'static str {
        match self {
            MeddicField::Metrics =>
                "Ask what a successful outcome looks like in numbers. \"How would you measure the impact?\"",
            MeddicField::EconomicBuyer =>
                "Find out who controls the budget. \"Who would ultimately sign off on something like this?\"",
            MeddicField::DecisionCriteria =>
                "Surface the evaluation criteria. \"What would the solution need to do to win your team over?\"",
            MeddicField::DecisionProcess =>
                "Map the buying process. \"Walk me through how a decision like this usually gets made.\"",
            MeddicField::Pain =>
                "Dig into the pain. \"What does this problem cost you today when it goes wrong?\"",
            MeddicField::Champion =>
                "Identify an internal advocate. \"Who on your side feels this pain most strongly?\"",
        }
    }

    /// Parse a field from a marker token (as emitted by the generation
    /// service in structured hints)
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "metrics" => Some(MeddicField::Metrics),
            "economic_buyer" => Some(MeddicField::EconomicBuyer),
            "decision_criteria" => Some(MeddicField::DecisionCriteria),
            "decision_process" => Some(MeddicField::DecisionProcess),
            "pain" | "identify_pain" => Some(MeddicField::Pain),
            "champion" => Some(MeddicField::Champion),
            _ => None,
        }
    }
}

/// Completion state for all six fields plus free-text notes per field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeddicMap {
    complete: HashMap<MeddicField, bool>,
    notes: HashMap<MeddicField, String>,
}

impl MeddicMap {
    /// Create an empty map (all fields incomplete)
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a single field
    pub fn is_complete(&self, field: MeddicField) -> bool {
        self.complete.get(&field).copied().unwrap_or(false)
    }

    /// Mark a field complete with a supporting note. Returns true if the
    /// field flipped (fields never flip back).
    pub fn mark_complete(&mut self, field: MeddicField, note: impl Into<String>) -> bool {
        let flipped = !self.is_complete(field);
        self.complete.insert(field, true);
        let note = note.into();
        if !note.trim().is_empty() {
            self.notes.insert(field, note);
        }
        flipped
    }

    /// Get the note recorded for a field
    pub fn note(&self, field: MeddicField) -> Option<&str> {
        self.notes.get(&field).map(String::as_str)
    }

    /// Count of complete fields
    pub fn complete_count(&self) -> usize {
        MeddicField::ALL.iter().filter(|f| self.is_complete(**f)).count()
    }

    /// Completion as a percentage for display (complete / 6)
    pub fn completion_pct(&self) -> f32 {
        self.complete_count() as f32 / MeddicField::ALL.len() as f32 * 100.0
    }

    /// First incomplete field in canonical order, if any
    pub fn first_incomplete(&self) -> Option<MeddicField> {
        MeddicField::ALL.iter().copied().find(|f| !self.is_complete(*f))
    }

    /// Fields still incomplete, in canonical order
    pub fn incomplete_fields(&self) -> Vec<MeddicField> {
        MeddicField::ALL
            .iter()
            .copied()
            .filter(|f| !self.is_complete(*f))
            .collect()
    }
}

/// Pre-call brief: MEDDIC seed values and anticipated objections, consumed
/// once at call start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreCallBrief {
    /// Account being called
    pub account_name: String,

    /// Free-form context notes fed to Tier 3 prompts
    pub context_notes: String,

    /// Fields already known before the call, with supporting notes
    pub meddic_seeds: Vec<(MeddicField, String)>,

    /// Objections the rep expects; matching Tier 1 patterns get a
    /// confidence boost
    pub anticipated_objections: Vec<String>,
}

impl PreCallBrief {
    /// Create a brief for an account
    pub fn new(account_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            ..Default::default()
        }
    }

    /// Seed a MEDDIC field as already known
    pub fn with_seed(mut self, field: MeddicField, note: impl Into<String>) -> Self {
        self.meddic_seeds.push((field, note.into()));
        self
    }

    /// Add an anticipated objection phrase
    pub fn with_anticipated_objection(mut self, phrase: impl Into<String>) -> Self {
        self.anticipated_objections.push(phrase.into());
        self
    }
}
