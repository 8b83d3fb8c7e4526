//! The six-stage compression pipeline.
//!
//! Identification → Preparation → Summarization → Checkpoint Creation →
//! Context Update → Validation, followed by goal tracking when a goal is
//! supplied. Every failure is collapsed into a [`CompressionResult`] and the
//! active context and session history are left as they were.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::CompressionSettings;
use super::progress::{CompressionStage, ProgressCallback, ProgressReporter};
use super::summary::{CheckpointRecord, CheckpointSummary, CompressionLevel};
use super::{MIN_COMPRESSIBLE_TOKENS, MIN_SUMMARY_TOKENS, SUMMARY_TARGET_RATIO};
use crate::context::{ActiveContext, ActiveContextState, SessionHistory};
use crate::errors::{CompressionError, ConfigError};
use crate::goals::{Goal, GoalProgressTracker, TrackingResult};
use crate::message::Message;
use crate::summarizer::{SummaryOutcome, SummaryRequest, Summarizer};
use crate::tokens::TokenCounter;
use crate::validation::{ValidationResult, ValidationService};

/// Messages selected for eviction by the identification stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionCandidates {
    /// Oldest first.
    pub messages: Vec<Message>,
    pub tokens: usize,
    /// Tokens of the recent messages that stay uncompressed.
    pub kept_tokens: usize,
    pub kept_count: usize,
}

/// Input for the summarization stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSummarization {
    pub messages: Vec<Message>,
    pub original_tokens: usize,
    pub level: CompressionLevel,
    pub max_summary_tokens: usize,
}

/// Outcome of a `compress` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompressionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSummary>,
    /// Original tokens minus checkpoint tokens; negative when the summary grew.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freed_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_progress: Option<TrackingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompressionResult {
    /// Failed result carrying the error's reason and detail.
    pub fn failed(err: &CompressionError) -> Self {
        let mut result = Self {
            success: false,
            reason: Some(err.reason().to_string()),
            error: Some(err.to_string()),
            ..Default::default()
        };
        match err {
            CompressionError::NoTokenReduction { freed_tokens } => {
                result.freed_tokens = Some(*freed_tokens);
            }
            CompressionError::StillOverLimit(validation) => {
                result.validation = Some((**validation).clone());
            }
            _ => {}
        }
        result
    }

    /// True when there was nothing worth compressing.
    pub fn is_noop(&self) -> bool {
        !self.success
            && self.reason.as_deref()
                == Some(CompressionError::NothingToCompress { candidate_tokens: 0 }.reason())
    }
}

/// Runs compression against an [`ActiveContext`] and [`SessionHistory`].
///
/// Cheap to clone; holds only shared handles and settings.
#[derive(Clone)]
pub struct CompressionPipeline {
    settings: CompressionSettings,
    counter: Arc<dyn TokenCounter>,
    summarizer: Arc<dyn Summarizer>,
    validator: ValidationService,
    tracker: Option<GoalProgressTracker>,
}

impl CompressionPipeline {
    pub fn new(
        settings: CompressionSettings,
        counter: Arc<dyn TokenCounter>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let validator = ValidationService::new(
            settings.ollama_limit(),
            settings.safety_margin(),
            counter.clone(),
        );
        Self {
            settings,
            counter,
            summarizer,
            validator,
            tracker: None,
        }
    }

    /// Apply summary markers to the goal passed to `compress`.
    pub fn with_goal_tracker(mut self, tracker: GoalProgressTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    pub fn validator(&self) -> &ValidationService {
        &self.validator
    }

    /// Rejected values leave the current percentage in place.
    pub fn set_keep_recent_percentage(&mut self, pct: f64) -> Result<(), ConfigError> {
        self.settings.set_keep_recent_percentage(pct)
    }

    /// Stage 1: select the oldest messages that do not fit the keep budget.
    ///
    /// Walks newest to oldest; the first message that does not fit and
    /// everything older become candidates.
    pub fn identify_messages_to_compress(
        &self,
        state: &ActiveContextState,
    ) -> Result<CompressionCandidates, CompressionError> {
        let budget = self.settings.keep_budget();
        let recent = &state.recent_messages;

        let mut kept_tokens = 0;
        let mut boundary = recent.len();
        for (index, message) in recent.iter().enumerate().rev() {
            let tokens = self.counter.count_message(message);
            if kept_tokens + tokens > budget {
                break;
            }
            kept_tokens += tokens;
            boundary = index;
        }

        let messages = recent[..boundary].to_vec();
        let tokens = self.counter.count_conversation_tokens(&messages);
        debug!(
            budget,
            kept_tokens,
            candidates = messages.len(),
            candidate_tokens = tokens,
            "Identified compression candidates"
        );

        if tokens < MIN_COMPRESSIBLE_TOKENS {
            return Err(CompressionError::NothingToCompress {
                candidate_tokens: tokens,
            });
        }

        Ok(CompressionCandidates {
            messages,
            tokens,
            kept_tokens,
            kept_count: recent.len() - boundary,
        })
    }

    /// Stage 2: pick the compression level and the summary cap.
    pub fn prepare_for_summarization(
        &self,
        candidates: CompressionCandidates,
    ) -> PreparedSummarization {
        let original_tokens = candidates.tokens;
        let target = (original_tokens as f64 * SUMMARY_TARGET_RATIO).floor() as usize;
        PreparedSummarization {
            messages: candidates.messages,
            original_tokens,
            level: CompressionLevel::for_input_tokens(original_tokens),
            max_summary_tokens: target.max(MIN_SUMMARY_TOKENS),
        }
    }

    /// Stage 4: build the checkpoint and its ledger record.
    pub fn create_checkpoint(
        &self,
        prepared: &PreparedSummarization,
        outcome: &SummaryOutcome,
        compression_number: u32,
    ) -> (CheckpointSummary, CheckpointRecord) {
        let model = if outcome.model.is_empty() {
            self.summarizer.model()
        } else {
            outcome.model.clone()
        };
        let mut checkpoint = CheckpointSummary::new(
            outcome.summary.clone(),
            prepared.messages.iter().map(|m| m.id.clone()).collect(),
            prepared.level,
            compression_number,
            model,
        );
        checkpoint.token_count = self
            .counter
            .count_tokens_cached(&checkpoint.cache_key(), &checkpoint.summary);

        let record = CheckpointRecord::for_checkpoint(&checkpoint, prepared.original_tokens);
        (checkpoint, record)
    }

    /// Stage 5: swap the original messages for the checkpoint.
    ///
    /// Returns the tokens freed. Nothing is mutated unless the checkpoint
    /// is strictly smaller than what it replaces.
    pub fn update_active_context(
        &self,
        ctx: &mut dyn ActiveContext,
        prepared: &PreparedSummarization,
        checkpoint: &CheckpointSummary,
    ) -> Result<i64, CompressionError> {
        let freed = prepared.original_tokens as i64 - checkpoint.token_count as i64;
        if freed <= 0 {
            return Err(CompressionError::NoTokenReduction {
                freed_tokens: freed,
            });
        }

        let snapshot = ctx.state();
        ctx.remove_messages(&checkpoint.original_message_ids)
            .map_err(CompressionError::Storage)?;
        if let Err(e) = ctx.add_checkpoint(checkpoint.clone()) {
            restore(ctx, snapshot)?;
            return Err(CompressionError::Storage(e));
        }
        Ok(freed)
    }

    /// Run a full compression.
    ///
    /// Never fails: every outcome, including cancellation, is a
    /// [`CompressionResult`]. A failed result leaves `ctx` and `history`
    /// unchanged.
    pub async fn compress(
        &self,
        ctx: &mut dyn ActiveContext,
        history: &mut dyn SessionHistory,
        goal: Option<&mut Goal>,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> CompressionResult {
        let mut reporter = ProgressReporter::new(progress);
        match self.run(ctx, history, goal, cancel, &mut reporter).await {
            Ok(result) => result,
            Err(err) if err.is_noop() => {
                info!(reason = err.reason(), "Compression skipped");
                reporter.report(CompressionStage::Complete, 100, err.reason());
                CompressionResult::failed(&err)
            }
            Err(err) => {
                warn!(reason = err.reason(), error = %err, "Compression failed");
                reporter.error(&err.to_string());
                CompressionResult::failed(&err)
            }
        }
    }

    async fn run(
        &self,
        ctx: &mut dyn ActiveContext,
        history: &mut dyn SessionHistory,
        mut goal: Option<&mut Goal>,
        cancel: &CancellationToken,
        reporter: &mut ProgressReporter,
    ) -> Result<CompressionResult, CompressionError> {
        reporter.enter(
            CompressionStage::Identification,
            "Identifying messages to compress",
        );
        let candidates = self.identify_messages_to_compress(&ctx.state())?;
        reporter.report(
            CompressionStage::Identification,
            15,
            &format!(
                "Selected {} messages ({} tokens), keeping {}",
                candidates.messages.len(),
                candidates.tokens,
                candidates.kept_count
            ),
        );

        reporter.enter(CompressionStage::Preparation, "Preparing summarization");
        let prepared = self.prepare_for_summarization(candidates);
        reporter.report(
            CompressionStage::Preparation,
            25,
            &format!(
                "Compression level {}, summary cap {} tokens",
                prepared.level, prepared.max_summary_tokens
            ),
        );

        reporter.enter(
            CompressionStage::Summarization,
            &format!("Summarizing {} messages", prepared.messages.len()),
        );
        let request = SummaryRequest {
            messages: prepared.messages.clone(),
            level: prepared.level,
            goal: goal.as_deref().cloned(),
            max_summary_tokens: prepared.max_summary_tokens,
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompressionError::Cancelled),
            result = self.summarizer.summarize(&request, cancel) => result
                .map_err(|e| CompressionError::SummarizationFailed(format!("{:#}", e)))?,
        };
        if !outcome.success {
            return Err(CompressionError::SummarizationFailed(
                outcome
                    .error
                    .unwrap_or_else(|| "Summarizer reported failure".to_string()),
            ));
        }
        if outcome.summary.trim().is_empty() {
            return Err(CompressionError::SummarizationFailed(
                "Summarizer returned an empty summary".to_string(),
            ));
        }
        reporter.report(CompressionStage::Summarization, 70, "Summary received");

        reporter.enter(CompressionStage::CheckpointCreation, "Creating checkpoint");
        let compression_number = history.history().total_compressions + 1;
        let (checkpoint, record) = self.create_checkpoint(&prepared, &outcome, compression_number);
        reporter.report(
            CompressionStage::CheckpointCreation,
            80,
            &format!(
                "Checkpoint #{}: {} -> {} tokens",
                compression_number, prepared.original_tokens, checkpoint.token_count
            ),
        );

        reporter.enter(CompressionStage::ContextUpdate, "Updating active context");
        let snapshot = ctx.state();
        let freed = self.update_active_context(ctx, &prepared, &checkpoint)?;
        reporter.report(
            CompressionStage::ContextUpdate,
            90,
            &format!("Freed {} tokens", freed),
        );

        reporter.enter(CompressionStage::Validation, "Validating compressed context");
        let validation = self.validator.validate_prompt_size(&ctx.build_prompt());
        if !validation.valid {
            restore(ctx, snapshot)?;
            return Err(CompressionError::StillOverLimit(Box::new(validation)));
        }
        if let Err(e) = history.record_checkpoint(record.clone()) {
            restore(ctx, snapshot)?;
            return Err(CompressionError::Storage(e));
        }
        reporter.report(
            CompressionStage::Validation,
            100,
            &format!("{} / {} tokens", validation.tokens, validation.limit),
        );

        info!(checkpoint_id = %checkpoint.id, "{}", record.status());
        reporter.report(CompressionStage::Complete, 100, &record.status());

        let goal_progress = match (goal.as_deref_mut(), &self.tracker) {
            (Some(goal), Some(tracker)) => {
                reporter.enter(CompressionStage::GoalTracking, "Tracking goal progress");
                let tracking = tracker.track_progress(&checkpoint.summary, goal);
                debug!(
                    goal_id = %goal.id,
                    updates = tracking.updates_applied,
                    "Goal tracking finished"
                );
                Some(tracking)
            }
            _ => None,
        };

        Ok(CompressionResult {
            success: true,
            reason: None,
            checkpoint: Some(checkpoint),
            freed_tokens: Some(freed),
            validation: Some(validation),
            goal_progress,
            error: None,
        })
    }
}

fn restore(
    ctx: &mut dyn ActiveContext,
    snapshot: ActiveContextState,
) -> Result<(), CompressionError> {
    ctx.restore(snapshot).map_err(CompressionError::Storage)
}
