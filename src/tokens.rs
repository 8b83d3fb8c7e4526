//! Token counting with an id-keyed cache.
//!
//! The pipeline never tokenizes directly; it goes through the [`TokenCounter`]
//! trait so tests and embedders can inject their own counting strategy.

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

use crate::config::{TokenEncoding, TokensSection};
use crate::errors::ConfigError;
use crate::message::Message;

/// Default characters per token for the estimating encoder.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Counts tokens for messages and arbitrary text.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in `text` without caching.
    fn count_text(&self, text: &str) -> usize;

    /// Count tokens for `content`, caching the result under `id`.
    ///
    /// Callers must never reuse an id for different content.
    fn count_tokens_cached(&self, id: &str, content: &str) -> usize;

    /// Drop the cached count for `id`, if any.
    fn invalidate(&self, id: &str);

    /// Tokens for a single message, preferring a precomputed count.
    fn count_message(&self, message: &Message) -> usize {
        message
            .token_count
            .unwrap_or_else(|| self.count_tokens_cached(&message.id, &message.content))
    }

    /// Total tokens across a conversation.
    fn count_conversation_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message(m)).sum()
    }
}

enum Encoder {
    Bpe(CoreBPE),
    Chars(usize),
}

/// Default [`TokenCounter`] backed by `tiktoken-rs` or a character estimate.
pub struct TokenCounterService {
    encoder: Encoder,
    cache: DashMap<String, usize>,
}

impl TokenCounterService {
    /// Counter using the `cl100k_base` BPE.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("Failed to load cl100k_base encoding")?;
        Ok(Self {
            encoder: Encoder::Bpe(bpe),
            cache: DashMap::new(),
        })
    }

    /// Counter that estimates `ceil(chars / chars_per_token)`.
    pub fn estimating(chars_per_token: usize) -> Result<Self, ConfigError> {
        if chars_per_token == 0 {
            return Err(ConfigError::ZeroCharsPerToken);
        }
        Ok(Self {
            encoder: Encoder::Chars(chars_per_token),
            cache: DashMap::new(),
        })
    }

    /// Build a counter from the `[tokens]` configuration section.
    pub fn from_section(section: &TokensSection) -> Result<Arc<dyn TokenCounter>> {
        let counter = match section.encoding {
            TokenEncoding::Cl100k => Self::cl100k()?,
            TokenEncoding::Chars => Self::estimating(section.chars_per_token)?,
        };
        Ok(Arc::new(counter))
    }

    /// Number of cached entries.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

}

impl TokenCounter for TokenCounterService {
    fn count_text(&self, text: &str) -> usize {
        match &self.encoder {
            Encoder::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Encoder::Chars(per_token) => text.chars().count().div_ceil(*per_token),
        }
    }

    fn count_tokens_cached(&self, id: &str, content: &str) -> usize {
        if let Some(cached) = self.cache.get(id) {
            return *cached;
        }
        let count = self.count_text(content);
        self.cache.insert(id.to_string(), count);
        count
    }

    fn invalidate(&self, id: &str) {
        self.cache.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimating_rounds_up() {
        let counter = TokenCounterService::estimating(4).unwrap();
        assert_eq!(counter.count_text(""), 0);
        assert_eq!(counter.count_text("abcd"), 1);
        assert_eq!(counter.count_text("abcde"), 2);
    }

    #[test]
    fn test_zero_chars_per_token_rejected() {
        assert!(matches!(
            TokenCounterService::estimating(0),
            Err(ConfigError::ZeroCharsPerToken)
        ));
    }

    #[test]
    fn test_cache_is_keyed_by_id() {
        let counter = TokenCounterService::estimating(4).unwrap();
        assert_eq!(counter.count_tokens_cached("m1", "abcdefgh"), 2);
        // Same id returns the cached value even for different content.
        assert_eq!(counter.count_tokens_cached("m1", "a"), 2);
        assert_eq!(counter.cache_len(), 1);

        counter.invalidate("m1");
        assert_eq!(counter.count_tokens_cached("m1", "a"), 1);
    }

    #[test]
    fn test_precomputed_count_wins() {
        let counter = TokenCounterService::estimating(4).unwrap();
        let msg = Message::user("abcd").with_token_count(250);
        assert_eq!(counter.count_message(&msg), 250);
        assert_eq!(counter.cache_len(), 0);
    }

    #[test]
    fn test_conversation_total() {
        let counter = TokenCounterService::estimating(4).unwrap();
        let messages = vec![
            Message::user("a".repeat(40)),
            Message::assistant("b".repeat(80)),
            Message::system("c").with_token_count(5),
        ];
        assert_eq!(counter.count_conversation_tokens(&messages), 10 + 20 + 5);
    }

    #[test]
    fn test_cl100k_counts_words() {
        let counter = TokenCounterService::cl100k().unwrap();
        let count = counter.count_text("hello world");
        assert!(count >= 2 && count <= 3);
    }
}
