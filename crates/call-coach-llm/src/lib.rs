//! Language model boundary
//!
//! Tiers 2 and 3 call out to a text-generation capability through the
//! [`LanguageModel`] trait. The engine treats it as an opaque async
//! function with a timeout; no vendor API shape leaks past this crate.

pub mod backend;
pub mod mock;
pub mod prompt;

pub use backend::{GenerateRequest, GenerateResponse, LanguageModel, LlmError};
pub use mock::{MockLanguageModel, ScriptedReply};
pub use prompt::{
    build_reframe_prompt, build_strategic_prompt, parse_generation, Message, ParsedGeneration,
    Role,
};
