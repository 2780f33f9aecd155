//! Prediction data types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence reported when the model omits `interest_score`
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

pub const DEFAULT_SENTIMENT: &str = "neutral";

/// Negotiation and objection intensity, both in model units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub negotiation: f64,
    pub objection: f64,
}

/// Typed result decoded from the scoring process
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Acceptance likelihood, 0 to 100
    pub prediction: f64,
    pub confidence: f64,
    pub sentiment: String,
    pub scores: Scores,
    /// Keyword category to matched terms; categories are never empty
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for PredictionResult {
    fn default() -> Self {
        Self {
            prediction: 0.0,
            confidence: DEFAULT_CONFIDENCE,
            sentiment: DEFAULT_SENTIMENT.to_string(),
            scores: Scores::default(),
            keywords: BTreeMap::new(),
        }
    }
}

/// Response returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub prediction: f64,
    pub confidence: f64,
    pub sentiment: String,
    pub scores: Scores,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keywords: BTreeMap<String, Vec<String>>,
    pub key_factors: Vec<String>,
}
