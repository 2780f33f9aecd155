use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error_codes;
use crate::api::models::{ApiError, HealthResponse};
use crate::error::PredictionError;
use crate::metrics::METRICS;
use crate::prediction::{PredictionPipeline, PredictionResponse};
use crate::scoring::ScoringError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Score a quote
///
/// POST /api/predictions/analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<PredictionResponse>, Response> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Malformed prediction request: {}", rejection.body_text());
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ApiError::new(error_codes::VALIDATION_ERROR, rejection.body_text())),
        )
            .into_response()
    })?;

    info!("Prediction request with {} fields", request.len());

    match state.pipeline.predict(request).await {
        Ok(outcome) => Ok(Json(outcome.response)),
        Err(e) => Err(error_response(e)),
    }
}

/// Map a pipeline error to its HTTP response
///
/// Scoring failures carry a fixed message per code; error details stay
/// server-side.
pub fn error_response(err: PredictionError) -> Response {
    let scoring = match err {
        PredictionError::Validation(errors) => {
            return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
        }
        PredictionError::Scoring(e) => e,
    };

    let (status, code, message) = match &scoring {
        ScoringError::Configuration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::CONFIGURATION_ERROR,
            "Scoring model is not available",
        ),
        ScoringError::Execution { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::MODEL_EXECUTION_ERROR,
            "Scoring model failed",
        ),
        ScoringError::Timeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            error_codes::TIMEOUT,
            "Scoring model timed out",
        ),
        ScoringError::ResultFormat(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::RESULT_FORMAT_ERROR,
            "Scoring model returned an unreadable result",
        ),
        ScoringError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "Internal error",
        ),
    };

    (status, Json(ApiError::new(code, message))).into_response()
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}
