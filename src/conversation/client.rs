//! HTTP client for the message service's processed-conversation endpoint

use super::models::ProcessedConversation;
use super::{ConversationError, ConversationSource};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Message service client configuration
#[derive(Debug, Clone)]
pub struct ConversationClientConfig {
    pub service_url: String,
    pub timeout: Duration,
}

impl Default for ConversationClientConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Fetches `GET {service_url}/api/messages/processed-conversation/{devisId}`
pub struct HttpConversationClient {
    config: ConversationClientConfig,
    http: Client,
}

impl HttpConversationClient {
    pub fn new(config: ConversationClientConfig) -> Result<Self, ConversationError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConversationError::Unavailable(e.to_string()))?;

        Ok(Self { config, http })
    }

    fn endpoint(&self, devis_id: i64) -> String {
        format!(
            "{}/api/messages/processed-conversation/{}",
            self.config.service_url.trim_end_matches('/'),
            devis_id
        )
    }
}

#[async_trait]
impl ConversationSource for HttpConversationClient {
    async fn fetch_processed_conversation(
        &self,
        devis_id: i64,
    ) -> Result<ProcessedConversation, ConversationError> {
        let url = self.endpoint(devis_id);
        debug!("Fetching processed conversation for devis {}", devis_id);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ConversationError::Timeout(self.config.timeout)
            } else {
                ConversationError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ConversationError::NotFound(devis_id));
        }
        if !status.is_success() {
            return Err(ConversationError::Unavailable(format!("Status {}", status)));
        }

        response
            .json::<ProcessedConversation>()
            .await
            .map_err(|e| ConversationError::InvalidResponse(e.to_string()))
    }
}
