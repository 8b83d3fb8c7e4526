//! Summarization of evicted conversation spans.
//!
//! The pipeline talks to an LLM only through the [`Summarizer`] trait.
//! [`CommandSummarizer`] is the production implementation; tests inject
//! their own.

mod command;
pub mod prompt;

pub use command::CommandSummarizer;
pub use prompt::build_summary_prompt;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::compaction::CompressionLevel;
use crate::goals::Goal;
use crate::message::Message;

/// Input to a single summarization call.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    /// Messages to compress, oldest first.
    pub messages: Vec<Message>,
    pub level: CompressionLevel,
    /// Goal whose progress the summary should report with markers.
    pub goal: Option<Goal>,
    /// Upper bound on the summary length.
    pub max_summary_tokens: usize,
}

/// Result of a summarization call.
///
/// `success == false` is handled exactly like an `Err` from
/// [`Summarizer::summarize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryOutcome {
    pub success: bool,
    pub summary: String,
    pub token_count: usize,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummaryOutcome {
    pub fn ok(summary: impl Into<String>, token_count: usize, model: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            token_count,
            model: model.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: String::new(),
            token_count: 0,
            model: model.into(),
            error: Some(error.into()),
        }
    }
}

/// Produces a compressed summary of a message span.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `request.messages`.
    ///
    /// Implementations should stop work promptly once `cancel` fires.
    async fn summarize(
        &self,
        request: &SummaryRequest,
        cancel: &CancellationToken,
    ) -> Result<SummaryOutcome>;

    /// Model label recorded in checkpoint metadata.
    fn model(&self) -> String;
}
