//! Error types for the prediction pipeline

use crate::features::ValidationErrors;
use crate::scoring::ScoringError;
use thiserror::Error;

/// Errors surfaced by [`crate::prediction::PredictionPipeline`]
#[derive(Error, Debug)]
pub enum PredictionError {
    /// Caller input failed validation; the scoring process was not invoked
    #[error("Invalid prediction request: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl PredictionError {
    /// True when the caller is at fault (HTTP 4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PredictionError>;
