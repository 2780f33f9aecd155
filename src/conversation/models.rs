//! Data models for conversation analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default length of the excerpt handed to the scoring model
pub const EXCERPT_MAX_CHARS: usize = 5000;

/// Appended to an excerpt that was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// A single message exchanged on a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl Message {
    pub fn new(sender_name: impl Into<String>, timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            timestamp,
            content: content.into(),
        }
    }
}

/// Keyword lists used for coverage-based indicator counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordLexicon {
    #[serde(default = "default_positive")]
    pub positive: Vec<String>,

    #[serde(default = "default_negative")]
    pub negative: Vec<String>,

    #[serde(default = "default_negotiation")]
    pub negotiation: Vec<String>,

    #[serde(default = "default_objection")]
    pub objection: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn default_positive() -> Vec<String> {
    words(&["bon", "excellent", "merci", "parfait", "super", "génial"])
}

fn default_negative() -> Vec<String> {
    words(&["problème", "erreur", "mauvais", "difficile", "impossible"])
}

fn default_negotiation() -> Vec<String> {
    words(&["prix", "remise", "réduction", "tarif", "coût"])
}

fn default_objection() -> Vec<String> {
    words(&["cher", "budget", "réfléchir", "attendre", "comparer"])
}

impl Default for KeywordLexicon {
    fn default() -> Self {
        Self {
            positive: default_positive(),
            negative: default_negative(),
            negotiation: default_negotiation(),
            objection: default_objection(),
        }
    }
}

/// Quantitative features derived from a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub message_count: usize,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub avg_message_length: f64,
    /// (positive hits - negative hits) / message count
    pub sentiment_score: f64,
    pub negotiation_indicators: usize,
    pub objection_indicators: usize,
    /// Minutes; 0.0 when the response-time lookup failed
    #[serde(default)]
    pub avg_response_time: f64,
}

/// Conversation text plus its statistics, as served by the message collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedConversation {
    pub raw_text: String,
    pub stats: ConversationStats,
}

/// Conversation text bounded for the scoring process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConversationExcerpt(String);

impl RawConversationExcerpt {
    /// Cut `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut
    pub fn from_text(text: &str, max_chars: usize) -> Self {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => {
                let mut excerpt = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
                excerpt.push_str(&text[..byte_idx]);
                excerpt.push_str(TRUNCATION_MARKER);
                Self(excerpt)
            }
            None => Self(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
