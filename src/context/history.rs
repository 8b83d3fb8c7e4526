//! Append-only session ledger of messages and compressions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compaction::CheckpointRecord;
use crate::message::Message;

/// Full ledger for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Every message ever recorded, including compressed ones.
    pub messages: Vec<Message>,
    pub total_messages: usize,
    pub checkpoints: Vec<CheckpointRecord>,
    pub total_compressions: u32,
}

impl SessionHistoryState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
            total_messages: 0,
            checkpoints: Vec::new(),
            total_compressions: 0,
        }
    }
}

/// Storage for the session ledger.
///
/// A failed call leaves the ledger unchanged.
pub trait SessionHistory: Send + Sync {
    fn history(&self) -> SessionHistoryState;

    fn record_message(&mut self, message: Message) -> Result<()>;

    fn record_checkpoint(&mut self, record: CheckpointRecord) -> Result<()>;
}

/// In-memory ledger with optional JSON file persistence.
///
/// With a backing file, each mutation writes the new ledger to disk before
/// swapping it into memory.
pub struct InMemorySessionHistory {
    state: SessionHistoryState,
    path: Option<PathBuf>,
}

impl InMemorySessionHistory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            state: SessionHistoryState::new(session_id),
            path: None,
        }
    }

    /// Persist the ledger to `path` on every mutation.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load a ledger previously written with [`with_file`](Self::with_file).
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session history {}", path.display()))?;
        let state: SessionHistoryState =
            serde_json::from_str(&content).context("Failed to parse session history")?;
        Ok(Self {
            state,
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the current ledger to its backing file, if it has one.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => write_state(path, &self.state),
            None => Ok(()),
        }
    }

    fn commit(&mut self, next: SessionHistoryState) -> Result<()> {
        if let Some(path) = &self.path {
            write_state(path, &next)?;
        }
        self.state = next;
        Ok(())
    }
}

fn write_state(path: &Path, state: &SessionHistoryState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("Failed to serialize session history")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write session history {}", path.display()))
}

impl SessionHistory for InMemorySessionHistory {
    fn history(&self) -> SessionHistoryState {
        self.state.clone()
    }

    fn record_message(&mut self, message: Message) -> Result<()> {
        let mut next = self.state.clone();
        next.messages.push(message);
        next.total_messages += 1;
        self.commit(next)
    }

    fn record_checkpoint(&mut self, record: CheckpointRecord) -> Result<()> {
        let mut next = self.state.clone();
        next.checkpoints.push(record);
        next.total_compressions += 1;
        self.commit(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::{CheckpointSummary, CompressionLevel};
    use tempfile::tempdir;

    fn record() -> CheckpointRecord {
        let mut checkpoint = CheckpointSummary::new(
            "summary",
            vec!["m1".into(), "m2".into()],
            CompressionLevel::Detailed,
            1,
            "test",
        );
        checkpoint.token_count = 10;
        CheckpointRecord::for_checkpoint(&checkpoint, 100)
    }

    #[test]
    fn test_records_are_appended() {
        let mut history = InMemorySessionHistory::new("s1");
        history.record_message(Message::user("hi")).unwrap();
        history.record_message(Message::assistant("hello")).unwrap();
        history.record_checkpoint(record()).unwrap();

        let state = history.history();
        assert_eq!(state.session_id, "s1");
        assert_eq!(state.total_messages, 2);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.total_compressions, 1);
        assert_eq!(state.checkpoints[0].message_range.count, 2);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = InMemorySessionHistory::new("s1").with_file(&path);
        history.record_message(Message::user("persisted")).unwrap();
        history.record_checkpoint(record()).unwrap();

        let loaded = InMemorySessionHistory::load(&path).unwrap();
        assert_eq!(loaded.history(), history.history());
    }

    #[test]
    fn test_save_writes_existing_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = InMemorySessionHistory::new("s1");
        history.record_message(Message::user("before the file")).unwrap();
        let history = history.with_file(&path);
        assert!(!path.exists());

        history.save().unwrap();
        let loaded = InMemorySessionHistory::load(&path).unwrap();
        assert_eq!(loaded.history().total_messages, 1);
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("history.json");

        let mut history = InMemorySessionHistory::new("s1").with_file(&path);
        assert!(history.record_message(Message::user("lost")).is_err());
        assert_eq!(history.history().total_messages, 0);
        assert!(history.history().messages.is_empty());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(InMemorySessionHistory::load(&dir.path().join("nope.json")).is_err());
    }
}
