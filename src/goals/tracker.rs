//! Applies parsed goal markers to a goal.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::markers::{GoalMarkerParser, ParsedGoalUpdate};
use super::types::{Artifact, ArtifactType, Decision, Goal, Subtask, SubtaskStatus};
use crate::errors::GoalError;

/// Outcome of applying a summary's markers to a goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingResult {
    /// False only when the goal could not accept updates at all.
    pub success: bool,
    pub updates_applied: usize,
    /// Every update that was applied.
    pub updates: Vec<ParsedGoalUpdate>,
    /// Updates that were parsed but rejected, with the reason.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Infer an artifact type from its path.
pub fn infer_artifact_type(path: &str) -> ArtifactType {
    let lower = path.to_lowercase();
    if lower.contains("test") || lower.contains("spec") {
        ArtifactType::Test
    } else if lower.ends_with(".md")
        || lower.ends_with(".txt")
        || lower.contains("doc")
        || lower.contains("readme")
    {
        ArtifactType::Documentation
    } else if [".json", ".yaml", ".yml", ".toml", ".ini"]
        .iter()
        .any(|ext| lower.ends_with(ext))
        || lower.contains("config")
    {
        ArtifactType::Configuration
    } else {
        ArtifactType::File
    }
}

/// Parses summaries and applies the markers to a goal.
#[derive(Debug, Clone, Default)]
pub struct GoalProgressTracker {
    parser: GoalMarkerParser,
}

impl GoalProgressTracker {
    pub fn new() -> Self {
        Self {
            parser: GoalMarkerParser::new(),
        }
    }

    pub fn track_progress(&self, summary: &str, goal: &mut Goal) -> TrackingResult {
        if goal.is_terminal() {
            return TrackingResult {
                success: false,
                error: Some(
                    GoalError::Terminal {
                        id: goal.id.clone(),
                        status: goal.status.to_string(),
                    }
                    .to_string(),
                ),
                ..Default::default()
            };
        }

        let mut result = TrackingResult {
            success: true,
            ..Default::default()
        };

        for update in self.parser.parse(summary) {
            match apply_update(goal, &update) {
                Ok(()) => {
                    debug!(goal_id = %goal.id, update = %update, "Applied goal update");
                    result.updates_applied += 1;
                    result.updates.push(update);
                }
                Err(e) => {
                    warn!(goal_id = %goal.id, update = %update, error = %e, "Skipping goal update");
                    result.failures.push(format!("{}: {}", update, e));
                }
            }
        }

        result
    }
}

fn apply_update(goal: &mut Goal, update: &ParsedGoalUpdate) -> Result<(), GoalError> {
    match update {
        ParsedGoalUpdate::Checkpoint {
            description,
            status,
        } => {
            let index = match goal
                .subtasks
                .iter()
                .position(|s| s.description.trim().eq_ignore_ascii_case(description.trim()))
            {
                Some(index) => index,
                None => {
                    goal.subtasks.push(Subtask::new(description.clone()));
                    goal.subtasks.len() - 1
                }
            };

            if *status == SubtaskStatus::Completed {
                let pending = goal.unmet_dependencies(&goal.subtasks[index]);
                if !pending.is_empty() {
                    return Err(GoalError::UnmetDependencies {
                        subtask_id: goal.subtasks[index].id.clone(),
                        pending,
                    });
                }
            }
            goal.subtasks[index].set_status(*status);
        }
        ParsedGoalUpdate::Decision {
            description,
            locked,
        } => match goal.find_decision_mut(description) {
            Some(decision) => {
                if *locked {
                    decision.lock();
                }
            }
            None => {
                let mut decision = Decision::new(description.clone());
                decision.locked = *locked;
                goal.decisions.push(decision);
            }
        },
        ParsedGoalUpdate::Artifact { action, path } => {
            goal.artifacts.push(Artifact {
                artifact_type: infer_artifact_type(path),
                path: path.clone(),
                action: *action,
                timestamp: Utc::now(),
                description: None,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::types::{ArtifactAction, GoalPriority, GoalStatus};

    fn goal() -> Goal {
        Goal::new("Ship the parser", GoalPriority::High, vec![])
    }

    #[test]
    fn test_checkpoint_creates_completed_subtask() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();

        let result = tracker.track_progress("[CHECKPOINT] Write tests - COMPLETED", &mut goal);

        assert!(result.success);
        assert_eq!(result.updates_applied, 1);
        assert_eq!(goal.subtasks.len(), 1);
        assert_eq!(goal.subtasks[0].description, "Write tests");
        assert_eq!(goal.subtasks[0].status, SubtaskStatus::Completed);
        assert!(goal.subtasks[0].completed_at.is_some());
        assert_eq!(goal.progress(), 100);
    }

    #[test]
    fn test_checkpoint_updates_existing_subtask_case_insensitively() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();
        goal.subtasks.push(Subtask::new("Write Tests"));

        tracker.track_progress("[CHECKPOINT] write tests - IN-PROGRESS", &mut goal);

        assert_eq!(goal.subtasks.len(), 1);
        assert_eq!(goal.subtasks[0].status, SubtaskStatus::InProgress);
    }

    #[test]
    fn test_decision_lock_is_one_way() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();

        tracker.track_progress("[DECISION] Use tokio - LOCKED", &mut goal);
        assert!(goal.decisions[0].locked);

        let result = tracker.track_progress("[DECISION] use tokio", &mut goal);
        assert_eq!(result.updates_applied, 1);
        assert_eq!(goal.decisions.len(), 1);
        assert!(goal.decisions[0].locked);
    }

    #[test]
    fn test_decision_can_escalate_to_locked() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();

        tracker.track_progress("[DECISION] Use tokio", &mut goal);
        assert!(!goal.decisions[0].locked);
        tracker.track_progress("[DECISION] Use tokio - LOCKED", &mut goal);
        assert!(goal.decisions[0].locked);
    }

    #[test]
    fn test_artifacts_always_append() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();

        tracker.track_progress(
            "[ARTIFACT] Created src/lib.rs\n[ARTIFACT] Modified src/lib.rs",
            &mut goal,
        );

        assert_eq!(goal.artifacts.len(), 2);
        assert_eq!(goal.artifacts[0].action, ArtifactAction::Created);
        assert_eq!(goal.artifacts[1].action, ArtifactAction::Modified);
        assert_eq!(goal.artifacts[0].artifact_type, ArtifactType::File);
    }

    #[test]
    fn test_infer_artifact_type() {
        assert_eq!(infer_artifact_type("tests/parser.rs"), ArtifactType::Test);
        assert_eq!(infer_artifact_type("src/app.spec.ts"), ArtifactType::Test);
        assert_eq!(infer_artifact_type("README.md"), ArtifactType::Documentation);
        assert_eq!(infer_artifact_type("notes.txt"), ArtifactType::Documentation);
        assert_eq!(infer_artifact_type("docs/guide.html"), ArtifactType::Documentation);
        assert_eq!(infer_artifact_type("Cargo.toml"), ArtifactType::Configuration);
        assert_eq!(infer_artifact_type("deploy.yml"), ArtifactType::Configuration);
        assert_eq!(infer_artifact_type("src/config.rs"), ArtifactType::Configuration);
        assert_eq!(infer_artifact_type("src/main.rs"), ArtifactType::File);
    }

    #[test]
    fn test_unmet_dependency_is_skipped_not_fatal() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();
        let first = Subtask::new("Design schema");
        let second = Subtask::new("Write migrations").with_dependencies(vec![first.id.clone()]);
        goal.subtasks.push(first);
        goal.subtasks.push(second);

        let result = tracker.track_progress(
            "[CHECKPOINT] Write migrations - COMPLETED\n[DECISION] Use Postgres",
            &mut goal,
        );

        assert!(result.success);
        assert_eq!(result.updates_applied, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(goal.subtasks[1].status, SubtaskStatus::Pending);
        assert_eq!(goal.decisions.len(), 1);
    }

    #[test]
    fn test_terminal_goal_rejects_updates() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();
        goal.status = GoalStatus::Completed;

        let result = tracker.track_progress("[CHECKPOINT] Late work - COMPLETED", &mut goal);

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(goal.subtasks.is_empty());
    }

    #[test]
    fn test_summary_without_markers() {
        let tracker = GoalProgressTracker::new();
        let mut goal = goal();
        let result = tracker.track_progress("Just prose.", &mut goal);
        assert!(result.success);
        assert_eq!(result.updates_applied, 0);
    }
}
