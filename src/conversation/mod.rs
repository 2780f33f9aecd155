//! Conversation analytics
//!
//! Turns the message history of a quote into numeric features:
//! - keyword coverage for sentiment, negotiation and objection signals
//! - word and message counts
//! - average reply delay (from the message collaborator)

pub mod client;
pub mod extractor;
pub mod models;
pub mod store;

pub use client::{ConversationClientConfig, HttpConversationClient};
pub use extractor::ConversationFeatureExtractor;
pub use models::{
    ConversationStats, KeywordLexicon, Message, ProcessedConversation, RawConversationExcerpt,
    EXCERPT_MAX_CHARS, TRUNCATION_MARKER,
};
pub use store::{InMemoryMessageStore, MessageStore};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Conversation lookup errors
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("No conversation for devis {0}")]
    NotFound(i64),

    #[error("Message service unavailable: {0}")]
    Unavailable(String),

    #[error("Conversation lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid conversation payload: {0}")]
    InvalidResponse(String),
}

/// Source of processed conversations, keyed by quote id
#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn fetch_processed_conversation(
        &self,
        devis_id: i64,
    ) -> Result<ProcessedConversation, ConversationError>;
}

/// In-process analyzer over a [`MessageStore`]
pub struct MessageHistoryAnalyzer {
    store: Arc<dyn MessageStore>,
    extractor: ConversationFeatureExtractor,
}

impl MessageHistoryAnalyzer {
    pub fn new(store: Arc<dyn MessageStore>, extractor: ConversationFeatureExtractor) -> Self {
        Self { store, extractor }
    }
}

#[async_trait]
impl ConversationSource for MessageHistoryAnalyzer {
    async fn fetch_processed_conversation(
        &self,
        devis_id: i64,
    ) -> Result<ProcessedConversation, ConversationError> {
        let messages = self.store.fetch_messages(devis_id).await?;

        let avg_response_time = match self.store.average_response_time(devis_id).await {
            Ok(minutes) => minutes,
            Err(e) => {
                warn!("Response time unavailable for devis {}: {}", devis_id, e);
                0.0
            }
        };

        Ok(self.extractor.extract(&messages, avg_response_time))
    }
}
