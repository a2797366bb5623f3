//! Error types shared across the coaching engine

use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or unusable input segment. Dropped and logged; never
    /// halts the pipeline.
    #[error("Input error: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
