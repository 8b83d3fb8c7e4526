//! Checkpoint types produced by compression.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// How aggressively the summarizer compresses its input.
///
/// Serialized as the integers 1 (compact) through 3 (detailed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CompressionLevel {
    /// Most aggressive, for large inputs.
    Compact = 1,
    Moderate = 2,
    /// Least aggressive, for small inputs.
    Detailed = 3,
}

impl CompressionLevel {
    /// Select the level for an input size: > 3000 tokens compact,
    /// 2000..=3000 moderate, otherwise detailed.
    pub fn for_input_tokens(tokens: usize) -> Self {
        if tokens > 3000 {
            CompressionLevel::Compact
        } else if tokens >= 2000 {
            CompressionLevel::Moderate
        } else {
            CompressionLevel::Detailed
        }
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CompressionLevel::Compact),
            2 => Ok(CompressionLevel::Moderate),
            3 => Ok(CompressionLevel::Detailed),
            other => Err(format!("invalid compression level {}", other)),
        }
    }
}

impl std::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionLevel::Compact => write!(f, "1 (compact)"),
            CompressionLevel::Moderate => write!(f, "2 (moderate)"),
            CompressionLevel::Detailed => write!(f, "3 (detailed)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// A compressed replacement for a contiguous span of older messages.
///
/// Created once per successful compression and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub original_message_ids: Vec<String>,
    pub token_count: usize,
    pub compression_level: CompressionLevel,
    /// 1-based sequence number of this compression within the session.
    pub compression_number: u32,
    pub metadata: CheckpointMetadata,
}

impl CheckpointSummary {
    pub fn new(
        summary: impl Into<String>,
        original_message_ids: Vec<String>,
        compression_level: CompressionLevel,
        compression_number: u32,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            summary: summary.into(),
            original_message_ids,
            token_count: 0,
            compression_level,
            compression_number,
            metadata: CheckpointMetadata {
                model: model.into(),
                created_at: now,
            },
        }
    }

    /// Cache key used when counting this checkpoint's tokens.
    ///
    /// Scoped so a summary can never collide with a message id.
    pub fn cache_key(&self) -> String {
        format!("checkpoint:{}", self.id)
    }

    /// Render the checkpoint as a system message for prompt assembly.
    ///
    /// The content is the summary text alone, so `token_count` covers it exactly.
    pub fn to_message(&self) -> Message {
        Message {
            id: self.id.clone(),
            role: crate::message::Role::System,
            content: self.summary.clone(),
            timestamp: self.timestamp,
            token_count: Some(self.token_count),
        }
    }
}

/// First and last message covered by a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRange {
    pub first_id: String,
    pub last_id: String,
    pub count: usize,
}

/// Append-only audit entry for a compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub message_range: MessageRange,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    /// compressed / original
    pub compression_ratio: f64,
    pub level: CompressionLevel,
}

impl CheckpointRecord {
    /// Build the ledger entry that mirrors `checkpoint`.
    pub fn for_checkpoint(checkpoint: &CheckpointSummary, original_tokens: usize) -> Self {
        let ids = &checkpoint.original_message_ids;
        let compression_ratio = if original_tokens == 0 {
            1.0
        } else {
            checkpoint.token_count as f64 / original_tokens as f64
        };

        Self {
            id: checkpoint.id.clone(),
            timestamp: checkpoint.timestamp,
            message_range: MessageRange {
                first_id: ids.first().cloned().unwrap_or_default(),
                last_id: ids.last().cloned().unwrap_or_default(),
                count: ids.len(),
            },
            original_tokens,
            compressed_tokens: checkpoint.token_count,
            compression_ratio,
            level: checkpoint.compression_level,
        }
    }

    /// Brief status for logging.
    pub fn status(&self) -> String {
        format!(
            "Compressed {} messages: {} -> {} tokens ({:.1}% of original)",
            self.message_range.count,
            self.original_tokens,
            self.compressed_tokens,
            self.compression_ratio * 100.0
        )
    }
}
