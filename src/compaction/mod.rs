//! Context Compression
//!
//! Keeps a conversation's prompt under the provider's token limit by
//! replacing the oldest messages with an LLM-written checkpoint summary.
//!
//! ## Stages
//!
//! | Stage               | Progress |
//! |---------------------|----------|
//! | Identification      | 0–15     |
//! | Preparation         | 15–25    |
//! | Summarization       | 25–70    |
//! | Checkpoint Creation | 70–80    |
//! | Context Update      | 80–90    |
//! | Validation          | 90–100   |
//!
//! Goal tracking runs after a successful compression when a goal is supplied.
//!
//! ## Configuration
//!
//! ```toml
//! [context]
//! ollama_limit = 8192
//! keep_recent_percentage = 0.5
//! safety_margin = 1000
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use contextkeeper::compaction::{CompressionPipeline, CompressionSettings};
//!
//! let pipeline = CompressionPipeline::new(CompressionSettings::new(8192)?, counter, summarizer);
//! let result = pipeline.compress(&mut ctx, &mut history, None, &cancel, None).await;
//! if !result.success {
//!     eprintln!("{}", result.reason.unwrap_or_default());
//! }
//! ```

mod config;
mod pipeline;
mod progress;
mod summary;
mod tracker;

pub use config::{
    CompressionSettings, DEFAULT_KEEP_RECENT_PERCENTAGE, MAX_KEEP_RECENT_PERCENTAGE,
    MIN_KEEP_RECENT_PERCENTAGE, validate_keep_recent_percentage,
};
pub use pipeline::{
    CompressionCandidates, CompressionPipeline, CompressionResult, PreparedSummarization,
};
pub use progress::{CompressionStage, ProgressCallback};
pub use summary::{
    CheckpointMetadata, CheckpointRecord, CheckpointSummary, CompressionLevel, MessageRange,
};
pub use tracker::{ContextTracker, ContextUsage};

/// Candidate sets smaller than this are not worth a summarization call.
pub const MIN_COMPRESSIBLE_TOKENS: usize = 500;

/// Summary cap as a share of the original tokens.
pub const SUMMARY_TARGET_RATIO: f64 = 0.6;

/// Lower bound on the summary cap.
pub const MIN_SUMMARY_TOKENS: usize = 300;
