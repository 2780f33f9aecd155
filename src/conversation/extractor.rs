//! Conversation feature extraction
//!
//! Indicator counts measure keyword *coverage*: each keyword contributes at
//! most once per conversation, however often it occurs.

use super::models::{ConversationStats, KeywordLexicon, Message, ProcessedConversation};

/// Derives [`ConversationStats`] from an ordered message list
#[derive(Debug, Clone, Default)]
pub struct ConversationFeatureExtractor {
    lexicon: KeywordLexicon,
}

impl ConversationFeatureExtractor {
    pub fn new(lexicon: KeywordLexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &KeywordLexicon {
        &self.lexicon
    }

    /// Extract text and statistics; `avg_response_time` is supplied by the caller
    pub fn extract(&self, messages: &[Message], avg_response_time: f64) -> ProcessedConversation {
        let raw_text = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let message_count = messages.len();
        let word_count = raw_text.split_whitespace().count();

        let avg_message_length = if message_count == 0 {
            0.0
        } else {
            let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
            total as f64 / message_count as f64
        };

        let lowered = raw_text.to_lowercase();
        let positive = keyword_coverage(&lowered, &self.lexicon.positive);
        let negative = keyword_coverage(&lowered, &self.lexicon.negative);

        let sentiment_score = if message_count == 0 {
            0.0
        } else {
            (positive as f64 - negative as f64) / message_count as f64
        };

        let stats = ConversationStats {
            message_count,
            word_count,
            avg_message_length,
            sentiment_score,
            negotiation_indicators: keyword_coverage(&lowered, &self.lexicon.negotiation),
            objection_indicators: keyword_coverage(&lowered, &self.lexicon.objection),
            avg_response_time,
        };

        ProcessedConversation { raw_text, stats }
    }
}

/// Number of keywords present at least once in `lowered_text`
fn keyword_coverage(lowered_text: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|k| !k.is_empty() && lowered_text.contains(&k.to_lowercase()))
        .count()
}
