//! Session orchestration.
//!
//! [`ContextOrchestrator`] owns every session's active context, history and
//! goals. Each session sits behind its own `tokio::sync::Mutex` inside a
//! `DashMap`, so work on one session never blocks another. A per-session
//! in-flight flag turns a concurrent second `compress` into an ordinary
//! failed result.

mod session;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::compaction::{
    CompressionPipeline, CompressionResult, ContextTracker, ContextUsage, ProgressCallback,
};
use crate::config::{ContextSection, GoalsSection, KeeperToml};
use crate::context::{
    ActiveContext, ActiveContextState, InMemoryActiveContext, InMemorySessionHistory,
    SessionHistory, SessionHistoryState,
};
use crate::errors::{CompressionError, OrchestratorError};
use crate::goals::{GoalManager, GoalProgressTracker};
use crate::message::Message;
use crate::summarizer::Summarizer;
use crate::tokens::TokenCounter;
use crate::validation::ValidationResult;

use session::{Session, SessionSlot};

pub struct ContextOrchestrator {
    context: ContextSection,
    goals: GoalsSection,
    counter: Arc<dyn TokenCounter>,
    /// Cloned per compression so a settings change never affects a running call.
    pipeline: RwLock<CompressionPipeline>,
    sessions: DashMap<String, Arc<SessionSlot>>,
}

impl ContextOrchestrator {
    pub fn new(
        config: &KeeperToml,
        counter: Arc<dyn TokenCounter>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, OrchestratorError> {
        let settings = config.compression_settings()?;
        let mut pipeline = CompressionPipeline::new(settings, counter.clone(), summarizer);
        if config.goals.enabled {
            pipeline = pipeline.with_goal_tracker(GoalProgressTracker::new());
        }

        Ok(Self {
            context: config.context.clone(),
            goals: config.goals.clone(),
            counter,
            pipeline: RwLock::new(pipeline),
            sessions: DashMap::new(),
        })
    }

    fn pipeline(&self) -> Result<CompressionPipeline, OrchestratorError> {
        self.pipeline
            .read()
            .map(|p| p.clone())
            .map_err(|_| OrchestratorError::LockPoisoned)
    }

    /// Change the share of the limit kept uncompressed.
    ///
    /// Out-of-range values are rejected and the current value is kept.
    pub fn set_keep_recent_percentage(&self, pct: f64) -> Result<(), OrchestratorError> {
        let mut pipeline = self
            .pipeline
            .write()
            .map_err(|_| OrchestratorError::LockPoisoned)?;
        pipeline.set_keep_recent_percentage(pct)?;
        info!(keep_recent_percentage = pct, "Updated keep-recent percentage");
        Ok(())
    }

    pub fn keep_recent_percentage(&self) -> Result<f64, OrchestratorError> {
        Ok(self.pipeline()?.settings().keep_recent_percentage())
    }

    fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>, OrchestratorError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))
    }

    /// Create an in-memory session.
    pub fn create_session(
        &self,
        session_id: &str,
        system_prompt: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let mut context = InMemoryActiveContext::new(self.counter.clone());
        if let Some(prompt) = system_prompt {
            context = context.with_system_prompt(prompt);
        }
        self.create_session_with(
            session_id,
            Box::new(context),
            Box::new(InMemorySessionHistory::new(session_id)),
        )
    }

    /// Create a session over caller-provided storage.
    pub fn create_session_with(
        &self,
        session_id: &str,
        context: Box<dyn ActiveContext>,
        history: Box<dyn SessionHistory>,
    ) -> Result<(), OrchestratorError> {
        let settings = self.pipeline()?.settings().clone();
        let mut tracker =
            ContextTracker::new(settings.effective_limit(), self.context.compression_threshold);
        tracker.set_total(context.state().token_count.total);
        let seen_ids = history
            .history()
            .messages
            .iter()
            .map(|m| m.id.clone())
            .collect::<HashSet<_>>();

        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(OrchestratorError::SessionExists(session_id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(SessionSlot::new(Session {
                    context,
                    history,
                    tracker,
                    goals: GoalManager::new(self.goals.clone()),
                    seen_ids,
                })));
                debug!(session_id, "Created session");
                Ok(())
            }
        }
    }

    /// Drop a session and evict its cached token counts.
    ///
    /// Waits for a compression running on the session to finish.
    pub async fn remove_session(&self, session_id: &str) -> Result<(), OrchestratorError> {
        let (_, slot) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;

        let session = slot.session.lock().await;
        for id in &session.seen_ids {
            self.counter.invalidate(&message_cache_key(session_id, id));
        }
        for checkpoint in session.context.state().checkpoints {
            self.counter.invalidate(&checkpoint.cache_key());
        }
        debug!(session_id, messages = session.seen_ids.len(), "Removed session");
        Ok(())
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Add a message, compressing automatically once the threshold is crossed.
    ///
    /// Returns the compression result when one ran.
    pub async fn add_message(
        &self,
        session_id: &str,
        mut message: Message,
    ) -> Result<Option<CompressionResult>, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;

        if session.seen_ids.contains(&message.id) {
            return Err(OrchestratorError::DuplicateMessageId(message.id));
        }
        if message.token_count.is_none() {
            let key = message_cache_key(session_id, &message.id);
            message.token_count = Some(self.counter.count_tokens_cached(&key, &message.content));
        }

        let id = message.id.clone();
        session.context.add_message(message.clone())?;
        if let Err(e) = session.history.record_message(message) {
            session.context.remove_messages(std::slice::from_ref(&id))?;
            return Err(e.into());
        }
        session.seen_ids.insert(id);
        let total = session.context.state().token_count.total;
        session.tracker.set_total(total);

        if !self.context.auto_compress || !session.tracker.should_compress() {
            return Ok(None);
        }
        let Some(_guard) = slot.begin_compression() else {
            return Ok(None);
        };

        debug!(session_id, tokens = total, "Compression threshold crossed");
        let pipeline = self.pipeline()?;
        let result =
            compress_session(&pipeline, &mut session, &CancellationToken::new(), None).await;
        Ok(Some(result))
    }

    /// Compress a session now.
    ///
    /// A second call while one is running returns a failed result with
    /// reason "Compression already in progress" and changes nothing.
    pub async fn compress(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<CompressionResult, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let Some(_guard) = slot.begin_compression() else {
            debug!(session_id, "Rejected concurrent compression");
            return Ok(CompressionResult::failed(
                &CompressionError::AlreadyInProgress,
            ));
        };

        let pipeline = self.pipeline()?;
        let mut session = slot.session.lock().await;
        Ok(compress_session(&pipeline, &mut session, cancel, progress).await)
    }

    pub async fn usage(&self, session_id: &str) -> Result<ContextUsage, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(session.tracker.usage())
    }

    pub async fn build_prompt(&self, session_id: &str) -> Result<Vec<Message>, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(session.context.build_prompt())
    }

    /// Validate the session's current prompt.
    pub async fn validate(&self, session_id: &str) -> Result<ValidationResult, OrchestratorError> {
        let pipeline = self.pipeline()?;
        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(pipeline
            .validator()
            .validate_prompt_size(&session.context.build_prompt()))
    }

    pub async fn state(&self, session_id: &str) -> Result<ActiveContextState, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(session.context.state())
    }

    pub async fn history(
        &self,
        session_id: &str,
    ) -> Result<SessionHistoryState, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(session.history.history())
    }

    /// Run `f` against the session's goal manager.
    pub async fn with_goals<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut GoalManager) -> R,
    ) -> Result<R, OrchestratorError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Ok(f(&mut session.goals))
    }
}

/// Token cache key for a message. Ids are only unique within a session.
fn message_cache_key(session_id: &str, message_id: &str) -> String {
    format!("{}:{}", session_id, message_id)
}

/// Compress a locked session and refresh its usage tracker.
async fn compress_session(
    pipeline: &CompressionPipeline,
    session: &mut Session,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> CompressionResult {
    let Session {
        context,
        history,
        tracker,
        goals,
        ..
    } = session;

    let result = pipeline
        .compress(
            context.as_mut(),
            history.as_mut(),
            goals.active_goal_mut(),
            cancel,
            progress,
        )
        .await;

    if result.success {
        if let Some(freed) = result.freed_tokens {
            tracker.apply_compression(freed.max(0) as usize);
        }
        tracker.set_total(context.state().token_count.total);
        if let (Some(goal_id), Some(tracking)) =
            (goals.active_goal_id().map(str::to_string), &result.goal_progress)
        {
            goals.record_tracking(&goal_id, tracking);
        }
    }
    result
}
