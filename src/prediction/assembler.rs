//! Response assembly and key-factor explanations

use super::models::{PredictionResponse, PredictionResult};

pub const STRONG_ACCEPTANCE: &str = "strong acceptance potential";
pub const IN_NEGOTIATION: &str = "client in negotiation";
pub const OBJECTIONS_TO_ADDRESS: &str = "objections to address";
pub const POSITIVE_SENTIMENT: &str = "positive sentiment";

const STRONG_ACCEPTANCE_THRESHOLD: f64 = 70.0;
const NEGOTIATION_THRESHOLD: f64 = 0.5;
const OBJECTION_THRESHOLD: f64 = 0.3;

/// Turns a [`PredictionResult`] into the caller-facing response
#[derive(Debug, Clone, Default)]
pub struct PredictionResultAssembler;

impl PredictionResultAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Explanations in fixed rule order; thresholds are strict
    pub fn key_factors(&self, result: &PredictionResult) -> Vec<String> {
        let mut factors = Vec::new();

        if result.prediction > STRONG_ACCEPTANCE_THRESHOLD {
            factors.push(STRONG_ACCEPTANCE.to_string());
        }
        if result.scores.negotiation > NEGOTIATION_THRESHOLD {
            factors.push(IN_NEGOTIATION.to_string());
        }
        if result.scores.objection > OBJECTION_THRESHOLD {
            factors.push(OBJECTIONS_TO_ADDRESS.to_string());
        }
        if result.sentiment == "positive" {
            factors.push(POSITIVE_SENTIMENT.to_string());
        }

        factors
    }

    pub fn assemble(&self, result: PredictionResult) -> PredictionResponse {
        let key_factors = self.key_factors(&result);
        PredictionResponse {
            prediction: result.prediction,
            confidence: result.confidence,
            sentiment: result.sentiment,
            scores: result.scores,
            keywords: result.keywords,
            key_factors,
        }
    }
}
