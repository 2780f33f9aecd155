//! Feature vector assembly with best-effort conversation enrichment

use super::{
    FeatureMap, FeatureValue, MESSAGES, MESSAGE_COUNT, NEGOTIATION_INDICATORS,
    OBJECTION_INDICATORS, SENTIMENT_SCORE,
};
use crate::conversation::{
    ConversationSource, ProcessedConversation, RawConversationExcerpt, EXCERPT_MAX_CHARS,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of the conversation lookup for one request
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Conversation fetched; its features are merged into the vector
    Applied(ProcessedConversation),
    /// No quote id given, or no conversation source configured
    Absent,
    /// Lookup failed or timed out; the vector is built without it
    Failed(String),
}

impl Enrichment {
    /// Short label used in logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Absent => "absent",
            Self::Failed(_) => "failed",
        }
    }
}

/// Merges caller fields with conversation-derived features
pub struct FeatureVectorBuilder {
    source: Option<Arc<dyn ConversationSource>>,
    lookup_timeout: Duration,
    excerpt_max_chars: usize,
}

impl FeatureVectorBuilder {
    pub fn new(source: Option<Arc<dyn ConversationSource>>, lookup_timeout: Duration) -> Self {
        Self {
            source,
            lookup_timeout,
            excerpt_max_chars: EXCERPT_MAX_CHARS,
        }
    }

    /// Builder that never enriches
    pub fn without_enrichment() -> Self {
        Self::new(None, Duration::from_secs(0))
    }

    pub fn with_excerpt_max_chars(mut self, max_chars: usize) -> Self {
        self.excerpt_max_chars = max_chars;
        self
    }

    /// Look up the conversation of the request's quote, bounded by the lookup timeout
    pub async fn enrich(&self, features: &FeatureMap) -> Enrichment {
        let devis_id = match features.devis_id() {
            None => return Enrichment::Absent,
            Some(Ok(id)) => id,
            Some(Err(raw)) => {
                warn!("Ignoring unparseable devisId {:?}", raw);
                return Enrichment::Failed(format!("invalid devisId {:?}", raw));
            }
        };

        let Some(source) = &self.source else {
            debug!("No conversation source configured, skipping enrichment for devis {}", devis_id);
            return Enrichment::Absent;
        };

        match tokio::time::timeout(
            self.lookup_timeout,
            source.fetch_processed_conversation(devis_id),
        )
        .await
        {
            Ok(Ok(conversation)) => {
                info!(
                    "Conversation enrichment for devis {}: {} messages",
                    devis_id, conversation.stats.message_count
                );
                Enrichment::Applied(conversation)
            }
            Ok(Err(e)) => {
                warn!("Conversation lookup failed for devis {}: {}", devis_id, e);
                Enrichment::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    "Conversation lookup for devis {} timed out after {:?}",
                    devis_id, self.lookup_timeout
                );
                Enrichment::Failed(format!("timed out after {:?}", self.lookup_timeout))
            }
        }
    }

    /// Merge an applied enrichment into the caller's features
    pub fn build(&self, mut features: FeatureMap, enrichment: &Enrichment) -> FeatureMap {
        let Enrichment::Applied(conversation) = enrichment else {
            return features;
        };

        if !conversation.raw_text.is_empty() {
            let excerpt =
                RawConversationExcerpt::from_text(&conversation.raw_text, self.excerpt_max_chars);
            features.insert(MESSAGES, excerpt.into_string());
        }

        let stats = &conversation.stats;
        features.insert(MESSAGE_COUNT, stats.message_count);
        features.insert(SENTIMENT_SCORE, FeatureValue::Number(stats.sentiment_score));
        features.insert(NEGOTIATION_INDICATORS, stats.negotiation_indicators);
        features.insert(OBJECTION_INDICATORS, stats.objection_indicators);

        features
    }
}
