//! Message history collaborator

use super::models::Message;
use super::ConversationError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to the messages exchanged on a quote
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages of a quote in retrieval order
    async fn fetch_messages(&self, devis_id: i64) -> Result<Vec<Message>, ConversationError>;

    /// Average reply delay on a quote, in minutes
    async fn average_response_time(&self, devis_id: i64) -> Result<f64, ConversationError>;
}

/// Process-local message store
#[derive(Default)]
pub struct InMemoryMessageStore {
    threads: RwLock<HashMap<i64, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a quote's thread
    pub fn push(&self, devis_id: i64, message: Message) {
        let mut threads = self.threads.write().unwrap_or_else(|e| e.into_inner());
        threads.entry(devis_id).or_default().push(message);
    }

    fn thread(&self, devis_id: i64) -> Result<Vec<Message>, ConversationError> {
        let threads = self.threads.read().unwrap_or_else(|e| e.into_inner());
        threads
            .get(&devis_id)
            .cloned()
            .ok_or(ConversationError::NotFound(devis_id))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn fetch_messages(&self, devis_id: i64) -> Result<Vec<Message>, ConversationError> {
        self.thread(devis_id)
    }

    async fn average_response_time(&self, devis_id: i64) -> Result<f64, ConversationError> {
        let messages = self.thread(devis_id)?;
        Ok(mean_reply_delay_minutes(&messages))
    }
}

/// Mean gap between consecutive messages whose sender changes
fn mean_reply_delay_minutes(messages: &[Message]) -> f64 {
    let delays: Vec<f64> = messages
        .windows(2)
        .filter(|pair| pair[0].sender_name != pair[1].sender_name)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64 / 60.0)
        .filter(|minutes| *minutes >= 0.0)
        .collect();

    if delays.is_empty() {
        0.0
    } else {
        delays.iter().sum::<f64>() / delays.len() as f64
    }
}
