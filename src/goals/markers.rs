//! Goal marker parsing from summarizer output.
//!
//! Extracts line-oriented progress markers:
//! - `[CHECKPOINT] <description> - <COMPLETED|IN-PROGRESS|PENDING|BLOCKED>`
//! - `[DECISION] <description>` with an optional trailing `- LOCKED`
//! - `[ARTIFACT] <Created|Modified|Deleted> <path>`
//!
//! Lines that carry a marker prefix but do not match the full pattern are
//! skipped without error.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

use super::types::{ArtifactAction, SubtaskStatus};

const CHECKPOINT_PREFIX: &str = "[CHECKPOINT]";
const DECISION_PREFIX: &str = "[DECISION]";
const ARTIFACT_PREFIX: &str = "[ARTIFACT]";

static CHECKPOINT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[CHECKPOINT\]\s+(.+?)\s+-\s+((?i:COMPLETED|IN-PROGRESS|PENDING|BLOCKED))\s*$")
        .unwrap()
});

static DECISION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[DECISION\]\s+(.+?)(\s+-\s+(?i:LOCKED))?\s*$").unwrap()
});

static ARTIFACT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[ARTIFACT\]\s+((?i:Created|Modified|Deleted))\s+(\S.*?)\s*$").unwrap()
});

/// A single structured update extracted from a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParsedGoalUpdate {
    Checkpoint {
        description: String,
        status: SubtaskStatus,
    },
    Decision {
        description: String,
        locked: bool,
    },
    Artifact {
        action: ArtifactAction,
        path: String,
    },
}

impl ParsedGoalUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedGoalUpdate::Checkpoint { .. } => "checkpoint",
            ParsedGoalUpdate::Decision { .. } => "decision",
            ParsedGoalUpdate::Artifact { .. } => "artifact",
        }
    }
}

impl std::fmt::Display for ParsedGoalUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedGoalUpdate::Checkpoint {
                description,
                status,
            } => write!(f, "checkpoint \"{}\" -> {}", description, status),
            ParsedGoalUpdate::Decision {
                description,
                locked,
            } => write!(
                f,
                "decision \"{}\"{}",
                description,
                if *locked { " (locked)" } else { "" }
            ),
            ParsedGoalUpdate::Artifact { action, path } => {
                write!(f, "artifact {} {}", action, path)
            }
        }
    }
}

/// Marker counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkerStats {
    pub checkpoints: usize,
    pub decisions: usize,
    pub artifacts: usize,
    pub total: usize,
}

/// Stateless parser for goal markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalMarkerParser;

impl GoalMarkerParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract every well-formed marker, in order of appearance.
    pub fn parse(&self, summary: &str) -> Vec<ParsedGoalUpdate> {
        let mut updates = Vec::new();

        for line in summary.lines() {
            let trimmed = line.trim_start();
            let update = if trimmed.starts_with(CHECKPOINT_PREFIX) {
                parse_checkpoint(line)
            } else if trimmed.starts_with(DECISION_PREFIX) {
                parse_decision(line)
            } else if trimmed.starts_with(ARTIFACT_PREFIX) {
                parse_artifact(line)
            } else {
                continue;
            };

            match update {
                Some(update) => updates.push(update),
                None => debug!(line = line.trim(), "Skipping malformed goal marker"),
            }
        }

        updates
    }

    /// Fast check for any marker prefix.
    pub fn has_markers(&self, text: &str) -> bool {
        text.contains(CHECKPOINT_PREFIX)
            || text.contains(DECISION_PREFIX)
            || text.contains(ARTIFACT_PREFIX)
    }

    pub fn stats(&self, text: &str) -> MarkerStats {
        let mut stats = MarkerStats::default();
        for update in self.parse(text) {
            match update {
                ParsedGoalUpdate::Checkpoint { .. } => stats.checkpoints += 1,
                ParsedGoalUpdate::Decision { .. } => stats.decisions += 1,
                ParsedGoalUpdate::Artifact { .. } => stats.artifacts += 1,
            }
            stats.total += 1;
        }
        stats
    }
}

fn parse_checkpoint(line: &str) -> Option<ParsedGoalUpdate> {
    let caps = CHECKPOINT_REGEX.captures(line)?;
    let description = caps.get(1)?.as_str().trim().to_string();
    let status = caps.get(2)?.as_str().parse::<SubtaskStatus>().ok()?;
    Some(ParsedGoalUpdate::Checkpoint {
        description,
        status,
    })
}

fn parse_decision(line: &str) -> Option<ParsedGoalUpdate> {
    let caps = DECISION_REGEX.captures(line)?;
    let description = caps.get(1)?.as_str().trim().to_string();
    Some(ParsedGoalUpdate::Decision {
        description,
        locked: caps.get(2).is_some(),
    })
}

fn parse_artifact(line: &str) -> Option<ParsedGoalUpdate> {
    let caps = ARTIFACT_REGEX.captures(line)?;
    let action = caps.get(1)?.as_str().parse::<ArtifactAction>().ok()?;
    let path = caps.get(2)?.as_str().to_string();
    Some(ParsedGoalUpdate::Artifact { action, path })
}

/// Convenience function to extract markers without creating a parser.
pub fn extract_markers(text: &str) -> Vec<ParsedGoalUpdate> {
    GoalMarkerParser::new().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkpoint() {
        let updates = extract_markers("[CHECKPOINT] Write tests - COMPLETED");
        assert_eq!(
            updates,
            vec![ParsedGoalUpdate::Checkpoint {
                description: "Write tests".into(),
                status: SubtaskStatus::Completed,
            }]
        );
    }

    #[test]
    fn test_checkpoint_status_is_case_insensitive() {
        let updates = extract_markers("[CHECKPOINT] Refactor parser - in-progress");
        assert_eq!(
            updates[0],
            ParsedGoalUpdate::Checkpoint {
                description: "Refactor parser".into(),
                status: SubtaskStatus::InProgress,
            }
        );
    }

    #[test]
    fn test_checkpoint_description_may_contain_dashes() {
        let updates = extract_markers("[CHECKPOINT] Add end-to-end tests - PENDING");
        assert_eq!(
            updates[0],
            ParsedGoalUpdate::Checkpoint {
                description: "Add end-to-end tests".into(),
                status: SubtaskStatus::Pending,
            }
        );
    }

    #[test]
    fn test_parse_decision_locked_and_unlocked() {
        let updates = extract_markers(
            "[DECISION] Use SQLite for storage - LOCKED\n[DECISION] Prefer async IO",
        );
        assert_eq!(
            updates,
            vec![
                ParsedGoalUpdate::Decision {
                    description: "Use SQLite for storage".into(),
                    locked: true,
                },
                ParsedGoalUpdate::Decision {
                    description: "Prefer async IO".into(),
                    locked: false,
                },
            ]
        );
    }

    #[test]
    fn test_parse_artifact() {
        let updates = extract_markers("[ARTIFACT] modified src/lib.rs");
        assert_eq!(
            updates[0],
            ParsedGoalUpdate::Artifact {
                action: ArtifactAction::Modified,
                path: "src/lib.rs".into(),
            }
        );
    }

    #[test]
    fn test_malformed_markers_are_skipped() {
        let text = "[CHECKPOINT] no status here\n\
                    [CHECKPOINT] Bad status - DONE\n\
                    [ARTIFACT] Renamed foo.rs\n\
                    [ARTIFACT] Created\n\
                    [DECISION]\n\
                    [CHECKPOINT] Real one - BLOCKED";
        let updates = extract_markers(text);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind(), "checkpoint");
    }

    #[test]
    fn test_markers_mixed_with_prose() {
        let text = "We worked on the parser today.\n\
                    [CHECKPOINT] Parser - COMPLETED\n\
                    Some more discussion about [DECISION] inline which is not a marker.\n\
                      [ARTIFACT] Created docs/README.md\n";
        let updates = extract_markers(text);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].kind(), "artifact");
    }

    #[test]
    fn test_has_markers() {
        let parser = GoalMarkerParser::new();
        assert!(parser.has_markers("text [DECISION] x"));
        assert!(!parser.has_markers("plain summary"));
    }

    #[test]
    fn test_stats() {
        let text = "[CHECKPOINT] A - COMPLETED\n[CHECKPOINT] B - PENDING\n[DECISION] C\n[ARTIFACT] Deleted old.rs";
        let stats = GoalMarkerParser::new().stats(text);
        assert_eq!(
            stats,
            MarkerStats {
                checkpoints: 2,
                decisions: 1,
                artifacts: 1,
                total: 4,
            }
        );
    }

    #[test]
    fn test_update_serializes_with_type_tag() {
        let update = ParsedGoalUpdate::Decision {
            description: "x".into(),
            locked: true,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"type\":\"decision\""));
    }
}
