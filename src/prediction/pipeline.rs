//! Request orchestration: enrichment, validation, scoring, assembly

use super::assembler::PredictionResultAssembler;
use super::models::PredictionResponse;
use crate::config::Config;
use crate::conversation::{
    ConversationClientConfig, ConversationError, ConversationSource, HttpConversationClient,
    MessageHistoryAnalyzer, MessageStore,
};
use crate::error::{PredictionError, Result};
use crate::features::{Enrichment, FeatureMap, FeatureValidator, FeatureVectorBuilder};
use crate::metrics::METRICS;
use crate::scoring::{ProcessScorer, Scorer};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of one successful prediction
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub response: PredictionResponse,
    /// How the conversation lookup went for this request
    pub enrichment: Enrichment,
}

/// End-to-end prediction pipeline
pub struct PredictionPipeline {
    builder: FeatureVectorBuilder,
    validator: FeatureValidator,
    scorer: Arc<dyn Scorer>,
    assembler: PredictionResultAssembler,
}

impl PredictionPipeline {
    pub fn new(builder: FeatureVectorBuilder, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            builder,
            validator: FeatureValidator::new(),
            scorer,
            assembler: PredictionResultAssembler::new(),
        }
    }

    /// Wire the subprocess scorer and, when a message service is configured,
    /// the HTTP conversation source
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConversationError> {
        let source: Option<Arc<dyn ConversationSource>> = match &config.conversation.service_url {
            Some(url) => {
                info!("Conversation enrichment enabled via {}", url);
                Some(Arc::new(HttpConversationClient::new(ConversationClientConfig {
                    service_url: url.clone(),
                    timeout: config.conversation.enrichment_timeout(),
                })?))
            }
            None => {
                info!("Conversation enrichment disabled");
                None
            }
        };

        Ok(Self::with_source(config, source))
    }

    /// Wire the subprocess scorer and an in-process analyzer over `store`,
    /// using the configured keyword lexicon; `service_url` is not consulted
    pub fn from_config_with_store(config: &Config, store: Arc<dyn MessageStore>) -> Self {
        info!("Conversation enrichment enabled from the in-process message store");
        let analyzer = MessageHistoryAnalyzer::new(store, config.conversation.extractor());
        Self::with_source(config, Some(Arc::new(analyzer)))
    }

    fn with_source(config: &Config, source: Option<Arc<dyn ConversationSource>>) -> Self {
        let builder = FeatureVectorBuilder::new(source, config.conversation.enrichment_timeout())
            .with_excerpt_max_chars(config.conversation.excerpt_max_chars);

        Self::new(builder, Arc::new(ProcessScorer::new(&config.scoring)))
    }

    /// Score one caller request given as a JSON object
    pub async fn predict(&self, request: Map<String, Value>) -> Result<PredictionOutcome> {
        let features = FeatureMap::from_json(request);
        let devis_id = features.devis_id().and_then(|id| id.ok());
        let span = info_span!("prediction", request_id = %Uuid::new_v4(), devis_id = ?devis_id);

        let start = Instant::now();
        let result = self.run(features).instrument(span).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) if e.is_client_error() => "invalid",
            Err(_) => "error",
        };
        METRICS.record_prediction(status, start.elapsed().as_secs_f64());

        result
    }

    async fn run(&self, features: FeatureMap) -> Result<PredictionOutcome> {
        let enrichment = self.builder.enrich(&features).await;
        METRICS.record_enrichment(enrichment.outcome());

        let features = self.builder.build(features, &enrichment);
        let validated = match self.validator.check(features) {
            Ok(validated) => validated,
            Err(errors) => {
                METRICS.record_validation_failure();
                warn!("Rejected prediction request: {}", errors);
                return Err(PredictionError::Validation(errors));
            }
        };

        debug!(
            "Scoring {} features with {} scorer (enrichment {})",
            validated.features().len(),
            self.scorer.name(),
            enrichment.outcome()
        );

        let result = match self.scorer.score(&validated).await {
            Ok(result) => result,
            Err(e) => {
                error!("Scoring failed: {}", e);
                if let Some(output) = e.diagnostic_output() {
                    debug!(
                        output_bytes = output.len(),
                        output_lines = output.lines().count(),
                        "Scoring process output captured"
                    );
                }
                return Err(e.into());
            }
        };

        let response = self.assembler.assemble(result);
        info!(
            prediction = response.prediction,
            key_factors = response.key_factors.len(),
            "Prediction complete"
        );

        Ok(PredictionOutcome {
            response,
            enrichment,
        })
    }
}
