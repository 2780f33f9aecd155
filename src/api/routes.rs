//! Router construction

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{self, AppState};

/// Build the service router
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/predictions/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureVectorBuilder, ValidatedFeatures, REQUIRED_NUMERIC_FIELDS};
    use crate::prediction::{PredictionPipeline, PredictionResult};
    use crate::scoring::{Scorer, ScoringError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubScorer(Option<f64>);

    #[async_trait]
    impl Scorer for StubScorer {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn score(&self, _features: &ValidatedFeatures) -> Result<PredictionResult, ScoringError> {
            match self.0 {
                Some(prediction) => Ok(PredictionResult {
                    prediction,
                    ..Default::default()
                }),
                None => Err(ScoringError::Timeout {
                    after: Duration::from_secs(1),
                    output: String::new(),
                }),
            }
        }
    }

    fn app(prediction: Option<f64>) -> Router {
        let pipeline = PredictionPipeline::new(
            FeatureVectorBuilder::without_enrichment(),
            Arc::new(StubScorer(prediction)),
        );
        build_router(AppState::new(pipeline), 64 * 1024)
    }

    fn complete_request() -> Value {
        let fields: Map<String, Value> = REQUIRED_NUMERIC_FIELDS
            .iter()
            .map(|f| (f.to_string(), json!(1.5)))
            .collect();
        Value::Object(fields)
    }

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/predictions/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let response = app(Some(77.0))
            .oneshot(post_json(complete_request().to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["prediction"], json!(77.0));
        assert_eq!(body["confidence"], json!(0.8));
        assert_eq!(body["sentiment"], "neutral");
        assert_eq!(body["keyFactors"], json!(["strong acceptance potential"]));
        assert!(body.get("keywords").is_none());
    }

    #[tokio::test]
    async fn test_analyze_validation_error() {
        let mut request = complete_request();
        request["totalDevis"] = json!("lots");

        let response = app(Some(1.0))
            .oneshot(post_json(request.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"totalDevis": "not numeric"}));
    }

    #[tokio::test]
    async fn test_analyze_rejects_non_object_body() {
        let response = app(Some(1.0))
            .oneshot(post_json("[1, 2, 3]".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_timeout() {
        let response = app(None)
            .oneshot(post_json(complete_request().to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(read_json(response).await["code"], "TIMEOUT");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut request = complete_request();
        request["messages"] = json!("x".repeat(70 * 1024));

        let response = app(Some(1.0))
            .oneshot(post_json(request.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let router = app(Some(1.0));

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ok");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
