//! Goal lifecycle management.
//!
//! The manager owns every goal and enforces that at most one is `active`.
//! The active goal is held explicitly in `active_goal`; every transition
//! that activates a goal goes through `activate`, which pauses
//! whichever goal was active before.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::tracker::{GoalProgressTracker, TrackingResult, infer_artifact_type};
use super::types::{
    Artifact, ArtifactAction, Blocker, BlockerType, Decision, Goal, GoalCheckpoint, GoalPriority,
    GoalStatus, Subtask, SubtaskStatus,
};
use crate::config::GoalsSection;
use crate::errors::GoalError;

/// On-disk shape of a goal store.
#[derive(Debug, Serialize, Deserialize)]
struct GoalStore {
    goals: Vec<Goal>,
}

pub struct GoalManager {
    config: GoalsSection,
    /// Goals in creation order.
    goals: Vec<Goal>,
    active_goal: Option<String>,
    tracker: GoalProgressTracker,
}

impl GoalManager {
    pub fn new(config: GoalsSection) -> Self {
        Self {
            config,
            goals: Vec::new(),
            active_goal: None,
            tracker: GoalProgressTracker::new(),
        }
    }

    pub fn config(&self) -> &GoalsSection {
        &self.config
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn active_goal(&self) -> Option<&Goal> {
        self.active_goal.as_deref().and_then(|id| self.goal(id))
    }

    pub fn active_goal_id(&self) -> Option<&str> {
        self.active_goal.as_deref()
    }

    pub fn active_goal_mut(&mut self) -> Option<&mut Goal> {
        let id = self.active_goal.clone()?;
        self.goals.iter_mut().find(|g| g.id == id)
    }

    /// Goals filtered by status, in creation order.
    pub fn list_goals(&self, status: Option<GoalStatus>) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|g| status.is_none_or(|s| g.status == s))
            .collect()
    }

    fn goal_mut(&mut self, id: &str) -> Result<&mut Goal, GoalError> {
        self.goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GoalError::NotFound { id: id.to_string() })
    }

    /// Like `goal_mut` but rejects terminal goals.
    fn open_goal_mut(&mut self, id: &str) -> Result<&mut Goal, GoalError> {
        let goal = self.goal_mut(id)?;
        if goal.is_terminal() {
            return Err(GoalError::Terminal {
                id: goal.id.clone(),
                status: goal.status.to_string(),
            });
        }
        Ok(goal)
    }

    fn assert_single_active(&self) {
        let active: Vec<&str> = self
            .goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .map(|g| g.id.as_str())
            .collect();
        debug_assert!(active.len() <= 1, "multiple active goals: {:?}", active);
        debug_assert_eq!(active.first().copied(), self.active_goal.as_deref());
    }

    /// Make `id` the active goal, pausing the previous one.
    fn activate(&mut self, id: &str) -> Result<(), GoalError> {
        if let Some(previous) = self.active_goal.clone().filter(|prev| prev != id) {
            let now = Utc::now();
            let goal = self.goal_mut(&previous)?;
            goal.status = GoalStatus::Paused;
            goal.paused_at = Some(now);
            info!(goal_id = %previous, "Auto-paused previously active goal");
        }

        let goal = self.goal_mut(id)?;
        goal.status = GoalStatus::Active;
        goal.paused_at = None;
        self.active_goal = Some(id.to_string());
        Ok(())
    }

    fn deactivate(&mut self, id: &str) {
        if self.active_goal.as_deref() == Some(id) {
            self.active_goal = None;
        }
    }

    /// Create a goal and make it active.
    pub fn create_goal(
        &mut self,
        description: impl Into<String>,
        priority: GoalPriority,
        tags: Vec<String>,
    ) -> Result<String, GoalError> {
        if !self.config.enabled {
            return Err(GoalError::Disabled);
        }

        let mut goal = Goal::new(description, priority, tags);
        // Pushed paused so `activate` sees a single transition.
        goal.status = GoalStatus::Paused;
        let id = goal.id.clone();
        self.goals.push(goal);
        self.activate(&id)?;

        info!(goal_id = %id, "Created goal");
        self.assert_single_active();
        Ok(id)
    }

    /// Pause an active or blocked goal.
    ///
    /// A paused goal keeps its blockers; resuming it lands back in `blocked`
    /// while any remain unresolved.
    pub fn pause_goal(&mut self, id: &str) -> Result<(), GoalError> {
        let goal = self.open_goal_mut(id)?;
        if !matches!(goal.status, GoalStatus::Active | GoalStatus::Blocked) {
            return Err(GoalError::InvalidTransition {
                id: id.to_string(),
                action: "pause",
                status: goal.status.to_string(),
            });
        }
        goal.status = GoalStatus::Paused;
        goal.paused_at = Some(Utc::now());
        self.deactivate(id);

        self.assert_single_active();
        Ok(())
    }

    /// Resume a paused goal.
    ///
    /// A goal with unresolved blockers resumes into `blocked`; otherwise it
    /// becomes active and any other active goal is paused.
    pub fn resume_goal(&mut self, id: &str) -> Result<GoalStatus, GoalError> {
        let goal = self.open_goal_mut(id)?;
        if goal.status != GoalStatus::Paused {
            return Err(GoalError::InvalidTransition {
                id: id.to_string(),
                action: "resume",
                status: goal.status.to_string(),
            });
        }

        let status = if goal.unresolved_blockers() > 0 {
            goal.status = GoalStatus::Blocked;
            goal.paused_at = None;
            GoalStatus::Blocked
        } else {
            self.activate(id)?;
            GoalStatus::Active
        };

        self.assert_single_active();
        Ok(status)
    }

    /// Mark a goal completed.
    pub fn complete_goal(&mut self, id: &str) -> Result<(), GoalError> {
        self.finish(id, GoalStatus::Completed, None)
    }

    /// Mark a goal abandoned.
    pub fn abandon_goal(&mut self, id: &str, reason: Option<String>) -> Result<(), GoalError> {
        self.finish(id, GoalStatus::Abandoned, reason)
    }

    fn finish(
        &mut self,
        id: &str,
        status: GoalStatus,
        reason: Option<String>,
    ) -> Result<(), GoalError> {
        let auto_checkpoint = self.config.auto_checkpoint;
        let max_checkpoints = self.config.max_checkpoints_per_goal;

        let goal = self.open_goal_mut(id)?;
        goal.status = status;
        goal.completed_at = Some(Utc::now());
        goal.paused_at = None;
        goal.abandon_reason = reason;
        if auto_checkpoint {
            let checkpoint = goal.snapshot(format!("Goal {}", status), true);
            push_capped(&mut goal.checkpoints, checkpoint, max_checkpoints);
        }
        self.deactivate(id);

        info!(goal_id = %id, status = %status, "Goal finished");
        self.cleanup_completed();
        self.assert_single_active();
        Ok(())
    }

    /// Evict the oldest terminal goals beyond `max_completed_goals`.
    pub fn cleanup_completed(&mut self) -> usize {
        // Creation order breaks ties between equal timestamps.
        let mut finished: Vec<(chrono::DateTime<Utc>, usize, String)> = self
            .goals
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_terminal())
            .map(|(i, g)| (g.completed_at.unwrap_or(g.created_at), i, g.id.clone()))
            .collect();
        if finished.len() <= self.config.max_completed_goals {
            return 0;
        }

        finished.sort();
        let excess = finished.len() - self.config.max_completed_goals;
        let evict: Vec<String> = finished.into_iter().take(excess).map(|(_, _, id)| id).collect();
        self.goals.retain(|g| !evict.contains(&g.id));

        debug!(evicted = excess, "Cleaned up finished goals");
        excess
    }

    pub fn add_subtask(
        &mut self,
        goal_id: &str,
        description: impl Into<String>,
        depends_on: Vec<String>,
    ) -> Result<String, GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        if let Some(missing) = depends_on
            .iter()
            .find(|dep| !goal.subtasks.iter().any(|s| &s.id == *dep))
        {
            return Err(GoalError::SubtaskNotFound {
                goal_id: goal_id.to_string(),
                subtask_id: missing.clone(),
            });
        }

        let subtask = Subtask::new(description).with_dependencies(depends_on);
        let id = subtask.id.clone();
        goal.subtasks.push(subtask);
        Ok(id)
    }

    /// Change a subtask's status; completing requires its dependencies to be complete.
    pub fn update_subtask_status(
        &mut self,
        goal_id: &str,
        subtask_id: &str,
        status: SubtaskStatus,
    ) -> Result<(), GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let index = goal
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or_else(|| GoalError::SubtaskNotFound {
                goal_id: goal_id.to_string(),
                subtask_id: subtask_id.to_string(),
            })?;

        if status == SubtaskStatus::Completed {
            let pending = goal.unmet_dependencies(&goal.subtasks[index]);
            if !pending.is_empty() {
                return Err(GoalError::UnmetDependencies {
                    subtask_id: subtask_id.to_string(),
                    pending,
                });
            }
        }
        goal.subtasks[index].set_status(status);
        Ok(())
    }

    pub fn add_decision(
        &mut self,
        goal_id: &str,
        description: impl Into<String>,
        rationale: impl Into<String>,
        alternatives: Vec<String>,
    ) -> Result<String, GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let mut decision = Decision::new(description);
        decision.rationale = rationale.into();
        decision.alternatives = alternatives;
        let id = decision.id.clone();
        goal.decisions.push(decision);
        Ok(id)
    }

    /// Lock a decision. Locking is permanent.
    pub fn lock_decision(&mut self, goal_id: &str, decision_id: &str) -> Result<(), GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let decision = goal
            .decisions
            .iter_mut()
            .find(|d| d.id == decision_id)
            .ok_or_else(|| GoalError::DecisionNotFound {
                goal_id: goal_id.to_string(),
                decision_id: decision_id.to_string(),
            })?;
        decision.lock();
        Ok(())
    }

    pub fn add_artifact(
        &mut self,
        goal_id: &str,
        path: impl Into<String>,
        action: ArtifactAction,
        description: Option<String>,
    ) -> Result<(), GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let path = path.into();
        goal.artifacts.push(Artifact {
            artifact_type: infer_artifact_type(&path),
            path,
            action,
            timestamp: Utc::now(),
            description,
        });
        Ok(())
    }

    /// Record a blocker. An active goal becomes blocked.
    pub fn add_blocker(
        &mut self,
        goal_id: &str,
        description: impl Into<String>,
        blocker_type: BlockerType,
    ) -> Result<String, GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let blocker = Blocker::new(description, blocker_type);
        let id = blocker.id.clone();
        goal.blockers.push(blocker);

        if goal.status == GoalStatus::Active {
            goal.status = GoalStatus::Blocked;
            self.deactivate(goal_id);
            info!(goal_id = %goal_id, "Goal blocked");
        }

        self.assert_single_active();
        Ok(id)
    }

    /// Resolve a blocker. Resolving the last one reactivates a blocked goal.
    pub fn resolve_blocker(
        &mut self,
        goal_id: &str,
        blocker_id: &str,
        resolution: impl Into<String>,
    ) -> Result<(), GoalError> {
        let goal = self.open_goal_mut(goal_id)?;
        let blocker = goal
            .blockers
            .iter_mut()
            .find(|b| b.id == blocker_id)
            .ok_or_else(|| GoalError::BlockerNotFound {
                goal_id: goal_id.to_string(),
                blocker_id: blocker_id.to_string(),
            })?;
        if blocker.is_resolved() {
            return Ok(());
        }
        blocker.resolved_at = Some(Utc::now());
        blocker.resolution = Some(resolution.into());

        if goal.status == GoalStatus::Blocked && goal.unresolved_blockers() == 0 {
            self.activate(goal_id)?;
            info!(goal_id = %goal_id, "Goal unblocked");
        }

        self.assert_single_active();
        Ok(())
    }

    /// Record a manual progress checkpoint.
    pub fn add_checkpoint(
        &mut self,
        goal_id: &str,
        description: impl Into<String>,
    ) -> Result<GoalCheckpoint, GoalError> {
        let max = self.config.max_checkpoints_per_goal;
        let goal = self.open_goal_mut(goal_id)?;
        let checkpoint = goal.snapshot(description, false);
        push_capped(&mut goal.checkpoints, checkpoint.clone(), max);
        Ok(checkpoint)
    }

    /// Apply a summary's markers to the active goal.
    ///
    /// Returns `None` when goals are disabled or nothing is active.
    pub fn apply_summary(&mut self, summary: &str) -> Option<TrackingResult> {
        if !self.config.enabled {
            return None;
        }
        let tracker = self.tracker.clone();
        let goal = self.active_goal_mut()?;
        let goal_id = goal.id.clone();
        let result = tracker.track_progress(summary, goal);
        self.record_tracking(&goal_id, &result);
        Some(result)
    }

    /// Count applied updates toward the auto-checkpoint interval.
    ///
    /// Called after a tracker has already mutated the goal.
    pub fn record_tracking(&mut self, goal_id: &str, result: &TrackingResult) {
        if result.updates_applied == 0 {
            return;
        }
        let interval = self.config.auto_checkpoint_interval;
        let enabled = self.config.auto_checkpoint && interval > 0;
        let max = self.config.max_checkpoints_per_goal;
        let Ok(goal) = self.open_goal_mut(goal_id) else {
            return;
        };

        goal.updates_since_checkpoint += result.updates_applied;
        if enabled && goal.updates_since_checkpoint >= interval {
            let checkpoint = goal.snapshot(
                format!("Automatic checkpoint after {} updates", goal.updates_since_checkpoint),
                true,
            );
            push_capped(&mut goal.checkpoints, checkpoint, max);
            goal.updates_since_checkpoint = 0;
            debug!(goal_id = %goal_id, "Recorded automatic checkpoint");
        }
    }

    /// Percent of subtasks completed.
    pub fn goal_progress(&self, id: &str) -> Result<u8, GoalError> {
        self.goal(id)
            .map(Goal::progress)
            .ok_or_else(|| GoalError::NotFound { id: id.to_string() })
    }

    pub fn to_json(&self) -> Result<String> {
        let store = GoalStore {
            goals: self.goals.clone(),
        };
        serde_json::to_string_pretty(&store).context("Failed to serialize goals")
    }

    /// Restore a manager from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str, config: GoalsSection) -> Result<Self> {
        let store: GoalStore = serde_json::from_str(json).context("Failed to parse goals")?;
        let active: Vec<&Goal> = store
            .goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .collect();
        if active.len() > 1 {
            anyhow::bail!("Goal store has {} active goals; at most one is allowed", active.len());
        }
        let active_goal = active.first().map(|g| g.id.clone());

        Ok(Self {
            config,
            goals: store.goals,
            active_goal,
            tracker: GoalProgressTracker::new(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write goals to {}", path.display()))
    }

    /// Load goals from `path`, or start empty when the file does not exist.
    pub fn load(path: &Path, config: GoalsSection) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(config));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read goals from {}", path.display()))?;
        Self::from_json(&content, config)
    }
}

fn push_capped(checkpoints: &mut Vec<GoalCheckpoint>, checkpoint: GoalCheckpoint, max: usize) {
    checkpoints.push(checkpoint);
    if max > 0 && checkpoints.len() > max {
        let excess = checkpoints.len() - max;
        checkpoints.drain(..excess);
    }
}
