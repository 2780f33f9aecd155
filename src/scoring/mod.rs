//! Scoring abstractions
//!
//! A [`Scorer`] turns a validated feature vector into a [`PredictionResult`].
//! [`ProcessScorer`] does so by running the external model as a child process.

pub mod parser;
pub mod process;

pub use parser::ResultParser;
pub use process::{Invocation, ProcessScorer, ScoringInvocationResult};

use crate::features::ValidatedFeatures;
use crate::prediction::PredictionResult;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Scoring errors
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Entry point or interpreter cannot be found
    #[error("Scoring process misconfigured: {0}")]
    Configuration(String),

    /// Non-zero exit; `output` is for server-side diagnostics only
    #[error("Scoring process failed with exit code {exit_code:?}")]
    Execution {
        exit_code: Option<i32>,
        output: String,
    },

    /// Killed after exceeding its time limit
    #[error("Scoring process timed out after {after:?}")]
    Timeout { after: Duration, output: String },

    #[error("Invalid scoring output: {0}")]
    ResultFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoringError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Captured process output, when there is any
    pub fn diagnostic_output(&self) -> Option<&str> {
        match self {
            Self::Execution { output, .. } | Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Pluggable scoring capability
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scorer name, used in logs
    fn name(&self) -> &'static str;

    /// Score one validated feature vector
    async fn score(&self, features: &ValidatedFeatures) -> Result<PredictionResult, ScoringError>;
}
