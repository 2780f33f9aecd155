//! Quote ("devis") acceptance scoring.
//!
//! Conversation analytics feed a validated feature vector into an external
//! scoring process; its output is decoded into a typed prediction with
//! human-readable key factors.

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod features;
pub mod metrics;
pub mod observability;
pub mod prediction;
pub mod scoring;

pub use config::Config;
pub use error::{PredictionError, Result};
pub use prediction::{PredictionPipeline, PredictionResponse};
