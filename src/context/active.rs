//! The live message window sent to the model.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::compaction::CheckpointSummary;
use crate::message::{Message, Role};
use crate::tokens::TokenCounter;

/// Cache key for the system prompt.
const SYSTEM_PROMPT_ID: &str = "system-prompt";

/// Token totals of an active context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub system: usize,
    pub checkpoints: usize,
    pub recent: usize,
    pub total: usize,
}

/// Snapshot of an active context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveContextState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub checkpoints: Vec<CheckpointSummary>,
    /// Uncompressed messages, oldest first.
    pub recent_messages: Vec<Message>,
    pub token_count: TokenBreakdown,
}

/// Storage for the live message window.
///
/// Mutations are all-or-nothing: an `Err` leaves the context unchanged.
pub trait ActiveContext: Send + Sync {
    fn state(&self) -> ActiveContextState;

    fn add_message(&mut self, message: Message) -> Result<()>;

    /// Remove the given messages; fails without mutating if any id is unknown.
    fn remove_messages(&mut self, ids: &[String]) -> Result<usize>;

    fn add_checkpoint(&mut self, checkpoint: CheckpointSummary) -> Result<()>;

    /// Assemble the prompt: system prompt, checkpoints, then recent messages.
    fn build_prompt(&self) -> Vec<Message>;

    /// Replace the whole context with an earlier snapshot.
    fn restore(&mut self, snapshot: ActiveContextState) -> Result<()>;
}

/// In-process [`ActiveContext`].
pub struct InMemoryActiveContext {
    system_prompt: Option<String>,
    checkpoints: Vec<CheckpointSummary>,
    recent_messages: Vec<Message>,
    tokens: TokenBreakdown,
    counter: Arc<dyn TokenCounter>,
}

impl InMemoryActiveContext {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            system_prompt: None,
            checkpoints: Vec::new(),
            recent_messages: Vec::new(),
            tokens: TokenBreakdown::default(),
            counter,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        // Uncached: the prompt id is shared by every context on a counter.
        self.tokens.system = self.counter.count_text(&prompt);
        self.system_prompt = Some(prompt);
        self.refresh_total();
        self
    }

    fn refresh_total(&mut self) {
        self.tokens.total = self.tokens.system + self.tokens.checkpoints + self.tokens.recent;
    }

    fn recount(&mut self) {
        self.tokens.checkpoints = self.checkpoints.iter().map(|c| c.token_count).sum();
        self.tokens.recent = self
            .recent_messages
            .iter()
            .map(|m| self.counter.count_message(m))
            .sum();
        self.refresh_total();
    }
}

impl ActiveContext for InMemoryActiveContext {
    fn state(&self) -> ActiveContextState {
        ActiveContextState {
            system_prompt: self.system_prompt.clone(),
            checkpoints: self.checkpoints.clone(),
            recent_messages: self.recent_messages.clone(),
            token_count: self.tokens.clone(),
        }
    }

    fn add_message(&mut self, mut message: Message) -> Result<()> {
        if self.recent_messages.iter().any(|m| m.id == message.id) {
            bail!("Message {} is already in the active context", message.id);
        }
        let tokens = self.counter.count_message(&message);
        message.token_count = Some(tokens);
        self.recent_messages.push(message);
        self.tokens.recent += tokens;
        self.refresh_total();
        Ok(())
    }

    fn remove_messages(&mut self, ids: &[String]) -> Result<usize> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let present = self
            .recent_messages
            .iter()
            .filter(|m| wanted.contains(m.id.as_str()))
            .count();
        if present != wanted.len() {
            bail!(
                "Cannot remove {} messages: only {} are in the active context",
                wanted.len(),
                present
            );
        }

        self.recent_messages
            .retain(|m| !wanted.contains(m.id.as_str()));
        self.recount();
        Ok(present)
    }

    fn add_checkpoint(&mut self, checkpoint: CheckpointSummary) -> Result<()> {
        if self.checkpoints.iter().any(|c| c.id == checkpoint.id) {
            bail!("Checkpoint {} already exists", checkpoint.id);
        }
        self.tokens.checkpoints += checkpoint.token_count;
        self.checkpoints.push(checkpoint);
        self.refresh_total();
        Ok(())
    }

    fn build_prompt(&self) -> Vec<Message> {
        let mut prompt = Vec::with_capacity(1 + self.checkpoints.len() + self.recent_messages.len());
        if let Some(system) = &self.system_prompt {
            prompt.push(
                Message::new(Role::System, system.clone())
                    .with_id(SYSTEM_PROMPT_ID)
                    .with_token_count(self.tokens.system),
            );
        }
        prompt.extend(self.checkpoints.iter().map(CheckpointSummary::to_message));
        prompt.extend(self.recent_messages.iter().cloned());
        prompt
    }

    fn restore(&mut self, snapshot: ActiveContextState) -> Result<()> {
        self.system_prompt = snapshot.system_prompt;
        self.checkpoints = snapshot.checkpoints;
        self.recent_messages = snapshot.recent_messages;
        self.tokens = snapshot.token_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::CompressionLevel;
    use crate::tokens::TokenCounterService;

    fn context() -> InMemoryActiveContext {
        InMemoryActiveContext::new(Arc::new(TokenCounterService::estimating(4).unwrap()))
    }

    #[test]
    fn test_add_message_counts_tokens() {
        let mut ctx = context().with_system_prompt("s".repeat(40));
        ctx.add_message(Message::user("a".repeat(400)).with_id("m1"))
            .unwrap();

        let state = ctx.state();
        assert_eq!(state.recent_messages[0].token_count, Some(100));
        assert_eq!(state.token_count.system, 10);
        assert_eq!(state.token_count.recent, 100);
        assert_eq!(state.token_count.total, 110);
    }

    #[test]
    fn test_duplicate_message_rejected() {
        let mut ctx = context();
        ctx.add_message(Message::user("a").with_id("m1")).unwrap();
        assert!(ctx.add_message(Message::user("b").with_id("m1")).is_err());
        assert_eq!(ctx.state().recent_messages.len(), 1);
    }

    #[test]
    fn test_remove_messages_is_all_or_nothing() {
        let mut ctx = context();
        ctx.add_message(Message::user("a").with_token_count(10).with_id("m1"))
            .unwrap();
        ctx.add_message(Message::user("b").with_token_count(20).with_id("m2"))
            .unwrap();
        let before = ctx.state();

        let err = ctx.remove_messages(&["m1".to_string(), "missing".to_string()]);
        assert!(err.is_err());
        assert_eq!(ctx.state(), before);

        assert_eq!(ctx.remove_messages(&["m1".to_string()]).unwrap(), 1);
        assert_eq!(ctx.state().token_count.total, 20);
    }

    #[test]
    fn test_build_prompt_order() {
        let mut ctx = context().with_system_prompt("be brief");
        let mut checkpoint =
            CheckpointSummary::new("earlier", vec![], CompressionLevel::Detailed, 1, "m");
        checkpoint.token_count = 7;
        ctx.add_checkpoint(checkpoint.clone()).unwrap();
        ctx.add_message(Message::user("latest").with_id("m9")).unwrap();

        let prompt = ctx.build_prompt();
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0].id, SYSTEM_PROMPT_ID);
        assert_eq!(prompt[1].id, checkpoint.id);
        assert_eq!(prompt[2].id, "m9");
        assert_eq!(ctx.state().token_count.checkpoints, 7);
    }

    #[test]
    fn test_restore_snapshot() {
        let mut ctx = context();
        ctx.add_message(Message::user("a").with_id("m1")).unwrap();
        let snapshot = ctx.state();

        ctx.remove_messages(&["m1".to_string()]).unwrap();
        assert!(ctx.state().recent_messages.is_empty());

        ctx.restore(snapshot.clone()).unwrap();
        assert_eq!(ctx.state(), snapshot);
    }
}
