//! Extraction of the scoring payload from process output
//!
//! The model may print progress or warnings before its result, so the
//! payload is located as the last complete JSON object in the output.

use super::process::MAX_CAPTURED_BYTES;
use super::ScoringError;
use crate::prediction::{PredictionResult, Scores, DEFAULT_CONFIDENCE, DEFAULT_SENTIMENT};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ScoringPayload {
    #[serde(default)]
    prediction: Option<f64>,
    #[serde(default)]
    interest_score: Option<f64>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    negotiation_score: Option<f64>,
    #[serde(default)]
    objection_score: Option<f64>,
    #[serde(default)]
    detected_keywords: Option<Value>,
}

/// Parses the model's JSON result into a [`PredictionResult`]
#[derive(Debug, Clone, Default)]
pub struct ResultParser;

impl ResultParser {
    pub fn new() -> Self {
        Self
    }

    /// Locate the trailing JSON object in `output`
    ///
    /// Only the last [`MAX_CAPTURED_BYTES`] of `output` are searched.
    pub fn extract_payload(output: &str) -> Result<Map<String, Value>, ScoringError> {
        let output = tail(output, MAX_CAPTURED_BYTES);
        let end = output
            .rfind('}')
            .ok_or_else(|| ScoringError::ResultFormat("no JSON object in scoring output".to_string()))?;
        let candidate = &output[..=end];

        for (start, _) in candidate.match_indices('{') {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&candidate[start..]) {
                return Ok(object);
            }
        }

        Err(ScoringError::ResultFormat(
            "no decodable JSON object in scoring output".to_string(),
        ))
    }

    pub fn parse(&self, output: &str) -> Result<PredictionResult, ScoringError> {
        let object = Self::extract_payload(output)?;
        let payload: ScoringPayload = serde_json::from_value(Value::Object(object))
            .map_err(|e| ScoringError::ResultFormat(format!("unexpected payload shape: {}", e)))?;

        Ok(PredictionResult {
            prediction: payload.prediction.unwrap_or(0.0),
            confidence: payload.interest_score.unwrap_or(DEFAULT_CONFIDENCE),
            sentiment: payload
                .sentiment
                .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string()),
            scores: Scores {
                negotiation: payload.negotiation_score.unwrap_or(0.0),
                objection: payload.objection_score.unwrap_or(0.0),
            },
            keywords: payload.detected_keywords.map(keywords).unwrap_or_default(),
        })
    }
}

/// Suffix of `text` no longer than `max_bytes`, cut at a char boundary
fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Category to keyword list, keeping non-empty lists only
fn keywords(value: Value) -> BTreeMap<String, Vec<String>> {
    match serde_json::from_value::<BTreeMap<String, Option<Vec<String>>>>(value) {
        Ok(categories) => categories
            .into_iter()
            .filter_map(|(category, words)| match words {
                Some(words) if !words.is_empty() => Some((category, words)),
                _ => None,
            })
            .collect(),
        Err(e) => {
            warn!("Ignoring malformed detected_keywords: {}", e);
            BTreeMap::new()
        }
    }
}
