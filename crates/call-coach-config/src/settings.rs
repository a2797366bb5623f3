//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Engine configuration
    #[serde(default)]
    pub engine: EngineSettings,

    /// Tier scheduling configuration
    #[serde(default)]
    pub tiers: TierSettings,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional TOML file plus `COACH_*` environment
    /// overrides (e.g. `COACH_TIERS__TIER3_BUDGET_MS=1500`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("COACH").separator("__"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.window_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.window_size".to_string(),
                message: "Rolling window must hold at least one segment".to_string(),
            });
        }

        if self.engine.display_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.display_window".to_string(),
                message: "Display window must hold at least one suggestion".to_string(),
            });
        }

        if self.tiers.tier2_budget_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "tiers.tier2_budget_ms".to_string(),
                message: "Tier 2 budget too low (minimum 100ms)".to_string(),
            });
        }

        if self.tiers.tier3_budget_ms <= self.tiers.tier2_budget_ms {
            return Err(ConfigError::InvalidValue {
                field: "tiers.tier3_budget_ms".to_string(),
                message: "Tier 3 budget must exceed the Tier 2 budget".to_string(),
            });
        }

        if self.tiers.tier3_failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tiers.tier3_failure_threshold".to_string(),
                message: "Circuit breaker threshold must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Final segments kept in the rolling transcript window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Most-recent suggestions exposed to the delivery sink
    #[serde(default = "default_display_window")]
    pub display_window: usize,

    /// A tier result whose snapshot is more than this many final segments
    /// behind the live conversation is discarded as stale
    #[serde(default = "default_max_generation_lag")]
    pub max_generation_lag: u64,

    /// Let Tier 1 react to interim (non-final) segments
    #[serde(default)]
    pub tier1_on_interim: bool,

    /// Delivery broadcast channel capacity; slow subscribers lose the
    /// oldest unread items past this depth
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            display_window: default_display_window(),
            max_generation_lag: default_max_generation_lag(),
            tier1_on_interim: false,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Tier scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSettings {
    /// Tier 2 latency budget in milliseconds
    #[serde(default = "default_tier2_budget_ms")]
    pub tier2_budget_ms: u64,

    /// Tier 3 latency budget in milliseconds
    #[serde(default = "default_tier3_budget_ms")]
    pub tier3_budget_ms: u64,

    /// Turns of context given to Tier 2
    #[serde(default = "default_tier2_context_turns")]
    pub tier2_context_turns: usize,

    /// Consecutive Tier 3 service errors that disable Tier 3 for the
    /// remainder of the call
    #[serde(default = "default_tier3_failure_threshold")]
    pub tier3_failure_threshold: u32,

    /// Token cap per generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            tier2_budget_ms: default_tier2_budget_ms(),
            tier3_budget_ms: default_tier3_budget_ms(),
            tier2_context_turns: default_tier2_context_turns(),
            tier3_failure_threshold: default_tier3_failure_threshold(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_window_size() -> usize {
    40
}

fn default_display_window() -> usize {
    5
}

fn default_max_generation_lag() -> u64 {
    3
}

fn default_event_capacity() -> usize {
    100
}

fn default_tier2_budget_ms() -> u64 {
    800
}

fn default_tier3_budget_ms() -> u64 {
    2000
}

fn default_tier2_context_turns() -> usize {
    4
}

fn default_tier3_failure_threshold() -> u32 {
    3
}

fn default_max_tokens() -> u32 {
    160
}

fn default_temperature() -> f32 {
    0.4
}
