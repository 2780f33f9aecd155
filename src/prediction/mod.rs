//! Prediction orchestration and response assembly

pub mod assembler;
pub mod models;
pub mod pipeline;

pub use assembler::PredictionResultAssembler;
pub use models::{PredictionResponse, PredictionResult, Scores, DEFAULT_CONFIDENCE, DEFAULT_SENTIMENT};
pub use pipeline::{PredictionOutcome, PredictionPipeline};
