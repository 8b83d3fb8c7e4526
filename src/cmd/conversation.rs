//! Conversation files read by `validate` and `compress`.
//!
//! Either a bare array of messages or an object with an optional
//! `system_prompt` and a `messages` array. Message `id` and `timestamp`
//! are optional; missing ids become `m0`, `m1`, ...

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use contextkeeper::context::{
    ActiveContext, InMemoryActiveContext, InMemorySessionHistory, SessionHistory,
};
use contextkeeper::message::{Message, Role};
use contextkeeper::tokens::TokenCounter;

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    role: Role,
    content: String,
    timestamp: Option<DateTime<Utc>>,
    token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConversationFile {
    Messages(Vec<Entry>),
    Document {
        #[serde(default)]
        system_prompt: Option<String>,
        messages: Vec<Entry>,
    },
}

pub struct Conversation {
    /// File stem, used as the session id.
    pub name: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read conversation: {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "conversation".to_string());
        Self::parse(&name, &content)
            .with_context(|| format!("Failed to parse conversation: {}", path.display()))
    }

    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let (system_prompt, entries) = match serde_json::from_str(content)? {
            ConversationFile::Messages(entries) => (None, entries),
            ConversationFile::Document {
                system_prompt,
                messages,
            } => (system_prompt, messages),
        };

        let messages = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Message {
                id: entry.id.unwrap_or_else(|| format!("m{}", index)),
                role: entry.role,
                content: entry.content,
                timestamp: entry.timestamp.unwrap_or_else(Utc::now),
                token_count: entry.token_count,
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            system_prompt,
            messages,
        })
    }

    /// Load every message into a fresh active context and history.
    pub fn into_session(
        self,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<(InMemoryActiveContext, InMemorySessionHistory)> {
        let mut context = InMemoryActiveContext::new(counter);
        if let Some(prompt) = self.system_prompt {
            context = context.with_system_prompt(prompt);
        }
        let mut history = InMemorySessionHistory::new(self.name);

        for message in self.messages {
            context.add_message(message.clone())?;
            history.record_message(message)?;
        }
        Ok((context, history))
    }
}
