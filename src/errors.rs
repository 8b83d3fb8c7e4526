//! Typed error hierarchy for contextkeeper.
//!
//! Four top-level enums cover the subsystems:
//! - `ConfigError`: invalid settings, rejected synchronously at the setter
//! - `GoalError`: goal lifecycle and lookup failures
//! - `CompressionError`: per-stage pipeline failures, collapsed into a `CompressionResult`
//! - `OrchestratorError`: session lookup and storage failures

use thiserror::Error;

use crate::validation::ValidationResult;

/// Errors from configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("keep_recent_percentage must be between 0.1 and 0.9, got {0}")]
    KeepRecentOutOfRange(f64),

    #[error("ollama_limit must be a positive integer")]
    ZeroLimit,

    #[error("ollama_limit is not set in [context]")]
    MissingLimit,

    #[error("compression_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("chars_per_token must be positive")]
    ZeroCharsPerToken,
}

/// Errors from goal management.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GoalError {
    #[error("Goal {id} not found")]
    NotFound { id: String },

    #[error("Subtask {subtask_id} not found in goal {goal_id}")]
    SubtaskNotFound { goal_id: String, subtask_id: String },

    #[error("Decision {decision_id} not found in goal {goal_id}")]
    DecisionNotFound {
        goal_id: String,
        decision_id: String,
    },

    #[error("Blocker {blocker_id} not found in goal {goal_id}")]
    BlockerNotFound { goal_id: String, blocker_id: String },

    #[error("Cannot {action} goal {id} while it is {status}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        status: String,
    },

    #[error("Goal {id} is {status} and can no longer be modified")]
    Terminal { id: String, status: String },

    #[error("Subtask {subtask_id} depends on unfinished subtasks: {}", .pending.join(", "))]
    UnmetDependencies {
        subtask_id: String,
        pending: Vec<String>,
    },

    #[error("Goal management is disabled")]
    Disabled,
}

/// Failures of a single compression attempt.
///
/// Every variant maps onto the `reason` string of a failed `CompressionResult`;
/// none of them escapes `CompressionPipeline::compress`.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("No messages to compress")]
    NothingToCompress { candidate_tokens: usize },

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Summarization cancelled")]
    Cancelled,

    #[error("Compression did not reduce token count (freed {freed_tokens} tokens)")]
    NoTokenReduction { freed_tokens: i64 },

    #[error("Context still exceeds limit after compression ({} > {})", .0.tokens, .0.limit)]
    StillOverLimit(Box<ValidationResult>),

    #[error("Compression already in progress")]
    AlreadyInProgress,

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl CompressionError {
    /// The human-readable reason surfaced in a failed result.
    pub fn reason(&self) -> &'static str {
        match self {
            CompressionError::NothingToCompress { .. } => "No messages to compress",
            CompressionError::SummarizationFailed(_) | CompressionError::Cancelled => {
                "Summarization failed"
            }
            CompressionError::NoTokenReduction { .. } => "Compression did not reduce token count",
            CompressionError::StillOverLimit(_) => "Context still exceeds limit after compression",
            CompressionError::AlreadyInProgress => "Compression already in progress",
            CompressionError::Storage(_) => "Compression error",
        }
    }

    /// No-op outcomes are reported as failures but are not errors.
    pub fn is_noop(&self) -> bool {
        matches!(self, CompressionError::NothingToCompress { .. })
    }
}

/// Errors from the session orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Session {0} already exists")]
    SessionExists(String),

    #[error("Message id {0} was already used in this session")]
    DuplicateMessageId(String),

    #[error("Configuration lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Goal(#[from] GoalError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
