//! Configuration for the call coaching engine
//!
//! Layered settings: defaults, optional file, environment overrides.

mod settings;

pub use settings::{EngineSettings, Settings, TierSettings};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
