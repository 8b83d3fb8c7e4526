//! Prompt size validation and remediation suggestions.
//!
//! `ValidationService` is a pure function of the message set and the token
//! counter. It never fails: an oversized prompt is reported through
//! `ValidationResult::errors` together with ranked `SuggestedAction`s.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::message::{Message, Role};
use crate::tokens::TokenCounter;

/// Tokens reserved for the model's response by default.
pub const DEFAULT_SAFETY_MARGIN: usize = 1000;

/// Assistant messages kept out of the compression estimate.
const RECENT_ASSISTANT_MESSAGES: usize = 5;

/// User messages kept out of the removal estimate.
const RECENT_USER_MESSAGES: usize = 10;

/// Share of old assistant tokens a summary is expected to recover.
const ASSISTANT_RECOVERY_RATIO: f64 = 0.7;

/// Share of checkpoint tokens a merge is expected to recover.
const CHECKPOINT_MERGE_RATIO: f64 = 0.5;

/// Corrective action kinds, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CompressOldAssistant,
    MergeCheckpoints,
    RemoveOldUser,
    EmergencyRollover,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::CompressOldAssistant => write!(f, "compress_old_assistant"),
            ActionKind::MergeCheckpoints => write!(f, "merge_checkpoints"),
            ActionKind::RemoveOldUser => write!(f, "remove_old_user"),
            ActionKind::EmergencyRollover => write!(f, "emergency_rollover"),
        }
    }
}

/// A ranked remediation for an oversized prompt. Priority 1 is tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub action: ActionKind,
    pub priority: u8,
    pub description: String,
    pub estimated_savings: usize,
}

/// Outcome of validating a prompt against the effective limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub tokens: usize,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overage: Option<usize>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<SuggestedAction>>,
}

/// Validates prompt size against `ollama_limit - safety_margin`.
#[derive(Clone)]
pub struct ValidationService {
    ollama_limit: usize,
    safety_margin: usize,
    counter: Arc<dyn TokenCounter>,
}

impl ValidationService {
    pub fn new(ollama_limit: usize, safety_margin: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            ollama_limit,
            safety_margin,
            counter,
        }
    }

    /// Provider limit minus the response safety margin.
    pub fn effective_limit(&self) -> usize {
        self.ollama_limit.saturating_sub(self.safety_margin)
    }

    pub fn ollama_limit(&self) -> usize {
        self.ollama_limit
    }

    pub fn safety_margin(&self) -> usize {
        self.safety_margin
    }

    /// Validate the full prompt.
    pub fn validate_prompt_size(&self, messages: &[Message]) -> ValidationResult {
        let tokens = self.counter.count_conversation_tokens(messages);
        let limit = self.effective_limit();

        if tokens <= limit {
            return ValidationResult {
                valid: true,
                tokens,
                limit,
                overage: None,
                errors: Vec::new(),
                suggestions: None,
            };
        }

        let overage = tokens - limit;
        let suggestions = self.suggest_actions(tokens, limit, messages);

        ValidationResult {
            valid: false,
            tokens,
            limit,
            overage: Some(overage),
            errors: vec![format!(
                "Prompt exceeds limit: {} tokens > {} (overage: {})",
                tokens, limit, overage
            )],
            suggestions: (!suggestions.is_empty()).then_some(suggestions),
        }
    }

    /// Ranked corrective actions for an oversized prompt.
    ///
    /// The checkpoint-merge and rollover triggers infer checkpoint presence
    /// from system-message counts; a real checkpoint-count signal should
    /// replace that proxy.
    pub fn suggest_actions(
        &self,
        total_tokens: usize,
        effective_limit: usize,
        messages: &[Message],
    ) -> Vec<SuggestedAction> {
        let mut actions = Vec::new();
        let overage = total_tokens.saturating_sub(effective_limit);

        let assistant: Vec<&Message> = by_role(messages, Role::Assistant);
        if assistant.len() > RECENT_ASSISTANT_MESSAGES {
            let old = &assistant[..assistant.len() - RECENT_ASSISTANT_MESSAGES];
            let old_tokens = self.sum_tokens(old);
            actions.push(SuggestedAction {
                action: ActionKind::CompressOldAssistant,
                priority: 1,
                description: format!("Compress {} older assistant messages", old.len()),
                estimated_savings: (old_tokens as f64 * ASSISTANT_RECOVERY_RATIO).floor() as usize,
            });
        }

        let system: Vec<&Message> = by_role(messages, Role::System);
        if system.len() > 1 {
            let checkpoint_tokens = self.sum_tokens(&system[1..]);
            actions.push(SuggestedAction {
                action: ActionKind::MergeCheckpoints,
                priority: 2,
                description: format!("Merge {} checkpoint summaries", system.len() - 1),
                estimated_savings: (checkpoint_tokens as f64 * CHECKPOINT_MERGE_RATIO).floor()
                    as usize,
            });
        }

        let user: Vec<&Message> = by_role(messages, Role::User);
        if user.len() > RECENT_USER_MESSAGES {
            let old = &user[..user.len() - RECENT_USER_MESSAGES];
            actions.push(SuggestedAction {
                action: ActionKind::RemoveOldUser,
                priority: 3,
                description: format!("Remove {} older user messages", old.len()),
                estimated_savings: self.sum_tokens(old),
            });
        }

        if overage as f64 > effective_limit as f64 * 0.5 {
            let non_system = self.counter.count_conversation_tokens(messages)
                - self.sum_tokens(&system);
            actions.push(SuggestedAction {
                action: ActionKind::EmergencyRollover,
                priority: 4,
                description: "Start a new session carrying only a summary of this one".to_string(),
                estimated_savings: non_system,
            });
        }

        actions.sort_by_key(|a| a.priority);
        actions
    }

    fn sum_tokens(&self, messages: &[&Message]) -> usize {
        messages.iter().map(|m| self.counter.count_message(m)).sum()
    }
}

fn by_role(messages: &[Message], role: Role) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == role).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenCounterService;

    fn service(limit: usize) -> ValidationService {
        let counter = Arc::new(TokenCounterService::estimating(4).unwrap());
        ValidationService::new(limit, DEFAULT_SAFETY_MARGIN, counter)
    }

    fn msg(role: Role, tokens: usize) -> Message {
        Message::new(role, "x").with_token_count(tokens)
    }

    #[test]
    fn test_effective_limit_subtracts_margin() {
        assert_eq!(service(8000).effective_limit(), 7000);
        assert_eq!(service(500).effective_limit(), 0);
    }

    #[test]
    fn test_valid_prompt_has_no_errors() {
        let result = service(8000).validate_prompt_size(&[msg(Role::User, 6999)]);
        assert!(result.valid);
        assert_eq!(result.tokens, 6999);
        assert_eq!(result.limit, 7000);
        assert!(result.overage.is_none());
        assert!(result.errors.is_empty());
        assert!(result.suggestions.is_none());
    }

    #[test]
    fn test_exactly_at_limit_is_valid() {
        let result = service(8000).validate_prompt_size(&[msg(Role::User, 7000)]);
        assert!(result.valid);
    }

    #[test]
    fn test_invalid_prompt_reports_overage_and_errors() {
        let mut messages = Vec::new();
        for _ in 0..6 {
            messages.push(msg(Role::Assistant, 1000));
        }
        messages.push(msg(Role::User, 2000));

        let result = service(8000).validate_prompt_size(&messages);
        assert!(!result.valid);
        assert_eq!(result.overage, Some(1000));
        assert!(!result.errors.is_empty());

        let suggestions = result.suggestions.unwrap();
        assert_eq!(suggestions[0].action, ActionKind::CompressOldAssistant);
        // One assistant message is older than the five most recent.
        assert_eq!(suggestions[0].estimated_savings, 700);
    }

    #[test]
    fn test_suggestions_sorted_by_priority() {
        let mut messages = vec![msg(Role::System, 100), msg(Role::System, 400)];
        for _ in 0..12 {
            messages.push(msg(Role::User, 500));
            messages.push(msg(Role::Assistant, 500));
        }

        let svc = service(8000);
        let total = svc.counter.count_conversation_tokens(&messages);
        let actions = svc.suggest_actions(total, svc.effective_limit(), &messages);

        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::CompressOldAssistant,
                ActionKind::MergeCheckpoints,
                ActionKind::RemoveOldUser,
                ActionKind::EmergencyRollover,
            ]
        );
        let priorities: Vec<u8> = actions.iter().map(|a| a.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);

        assert_eq!(actions[1].estimated_savings, 200);
        assert_eq!(actions[2].estimated_savings, 1000);
        assert_eq!(actions[3].estimated_savings, 12_000);
    }

    #[test]
    fn test_emergency_rollover_only_past_half_limit() {
        let svc = service(11_000);
        // Effective limit 10k; overage of exactly 50% does not trigger.
        let messages = vec![msg(Role::User, 15_000)];
        let actions = svc.suggest_actions(15_000, 10_000, &messages);
        assert!(
            actions
                .iter()
                .all(|a| a.action != ActionKind::EmergencyRollover)
        );

        let messages = vec![msg(Role::User, 15_001)];
        let actions = svc.suggest_actions(15_001, 10_000, &messages);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionKind::EmergencyRollover);
    }

    #[test]
    fn test_uncorrectable_overage_has_no_suggestions() {
        let result = service(2000).validate_prompt_size(&[msg(Role::User, 1200)]);
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
        assert!(result.suggestions.is_none());
    }
}
