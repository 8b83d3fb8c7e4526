//! Goal entities.
//!
//! A [`Goal`] owns its subtasks, checkpoints, decisions, artifacts and
//! blockers exclusively. All timestamps serialize as RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lifecycle state of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Paused,
    Blocked,
    Completed,
    Abandoned,
}

impl GoalStatus {
    /// Completed and abandoned goals accept no further changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Abandoned)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Paused => write!(f, "paused"),
            GoalStatus::Blocked => write!(f, "blocked"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "paused" => Ok(GoalStatus::Paused),
            "blocked" => Ok(GoalStatus::Blocked),
            "completed" => Ok(GoalStatus::Completed),
            "abandoned" => Ok(GoalStatus::Abandoned),
            other => Err(format!("unknown goal status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::InProgress => write!(f, "in-progress"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for SubtaskStatus {
    type Err = String;

    /// Case-insensitive; accepts `in-progress`, `in_progress` and `inprogress`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SubtaskStatus::Pending),
            "in-progress" | "in_progress" | "inprogress" => Ok(SubtaskStatus::InProgress),
            "completed" => Ok(SubtaskStatus::Completed),
            "blocked" => Ok(SubtaskStatus::Blocked),
            other => Err(format!("unknown subtask status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for GoalPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalPriority::Low => write!(f, "low"),
            GoalPriority::Medium => write!(f, "medium"),
            GoalPriority::High => write!(f, "high"),
            GoalPriority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for GoalPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            "critical" => Ok(GoalPriority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    pub status: SubtaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Ids of sibling subtasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Subtask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            status: SubtaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Set the status; completing stamps `completed_at`, leaving completed clears it.
    pub fn set_status(&mut self, status: SubtaskStatus) {
        self.status = status;
        self.completed_at = match status {
            SubtaskStatus::Completed => self.completed_at.or_else(|| Some(Utc::now())),
            _ => None,
        };
    }
}

/// A progress snapshot recorded against a goal.
///
/// Distinct from the context-compression `CheckpointSummary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalCheckpoint {
    pub id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Percent of subtasks completed when the snapshot was taken.
    pub progress: u8,
    pub subtasks_completed: usize,
    pub subtasks_total: usize,
    /// True when recorded by the auto-checkpoint policy.
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Once true, never reset.
    pub locked: bool,
}

impl Decision {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            rationale: String::new(),
            alternatives: Vec::new(),
            timestamp: Utc::now(),
            locked: false,
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    File,
    Test,
    Documentation,
    Configuration,
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactType::File => write!(f, "file"),
            ArtifactType::Test => write!(f, "test"),
            ArtifactType::Documentation => write!(f, "documentation"),
            ArtifactType::Configuration => write!(f, "configuration"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactAction {
    Created,
    Modified,
    Deleted,
}

impl std::fmt::Display for ArtifactAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactAction::Created => write!(f, "created"),
            ArtifactAction::Modified => write!(f, "modified"),
            ArtifactAction::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for ArtifactAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(ArtifactAction::Created),
            "modified" => Ok(ArtifactAction::Modified),
            "deleted" => Ok(ArtifactAction::Deleted),
            other => Err(format!("unknown artifact action '{}'", other)),
        }
    }
}

/// A file touched while pursuing a goal. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub path: String,
    pub action: ArtifactAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockerType {
    #[default]
    Technical,
    Dependency,
    Information,
    External,
}

impl std::str::FromStr for BlockerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "technical" => Ok(BlockerType::Technical),
            "dependency" => Ok(BlockerType::Dependency),
            "information" => Ok(BlockerType::Information),
            "external" => Ok(BlockerType::External),
            other => Err(format!("unknown blocker type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub blocker_type: BlockerType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Blocker {
    pub fn new(description: impl Into<String>, blocker_type: BlockerType) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            blocker_type,
            created_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// A unit of user intent tracked across compressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub checkpoints: Vec<GoalCheckpoint>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default)]
    pub priority: GoalPriority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon_reason: Option<String>,
    /// Tracker updates applied since the last automatic checkpoint.
    #[serde(default)]
    pub updates_since_checkpoint: usize,
}

impl Goal {
    /// A new goal in the `active` state.
    pub fn new(description: impl Into<String>, priority: GoalPriority, tags: Vec<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            status: GoalStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
            paused_at: None,
            subtasks: Vec::new(),
            checkpoints: Vec::new(),
            decisions: Vec::new(),
            artifacts: Vec::new(),
            blockers: Vec::new(),
            priority,
            tags,
            abandon_reason: None,
            updates_since_checkpoint: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Completed)
            .count()
    }

    /// Percent of subtasks completed; without subtasks, 100 when completed and 0 otherwise.
    pub fn progress(&self) -> u8 {
        if self.subtasks.is_empty() {
            return if self.status == GoalStatus::Completed { 100 } else { 0 };
        }
        ((self.completed_subtasks() * 100) / self.subtasks.len()) as u8
    }

    pub fn unresolved_blockers(&self) -> usize {
        self.blockers.iter().filter(|b| !b.is_resolved()).count()
    }

    /// Case-insensitive description lookup.
    pub fn find_subtask_mut(&mut self, description: &str) -> Option<&mut Subtask> {
        let needle = description.trim().to_lowercase();
        self.subtasks
            .iter_mut()
            .find(|s| s.description.trim().to_lowercase() == needle)
    }

    pub fn find_decision_mut(&mut self, description: &str) -> Option<&mut Decision> {
        let needle = description.trim().to_lowercase();
        self.decisions
            .iter_mut()
            .find(|d| d.description.trim().to_lowercase() == needle)
    }

    /// Ids of dependencies of `subtask` that are not yet completed.
    ///
    /// Unknown ids count as unmet.
    pub fn unmet_dependencies(&self, subtask: &Subtask) -> Vec<String> {
        subtask
            .depends_on
            .iter()
            .filter(|dep| {
                !self
                    .subtasks
                    .iter()
                    .any(|s| &s.id == *dep && s.status == SubtaskStatus::Completed)
            })
            .cloned()
            .collect()
    }

    /// Build a snapshot of the current progress.
    pub fn snapshot(&self, description: impl Into<String>, automatic: bool) -> GoalCheckpoint {
        GoalCheckpoint {
            id: new_id(),
            description: description.into(),
            timestamp: Utc::now(),
            progress: self.progress(),
            subtasks_completed: self.completed_subtasks(),
            subtasks_total: self.subtasks.len(),
            automatic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtask_status_serializes_kebab_case() {
        let json = serde_json::to_string(&SubtaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(
            "IN-PROGRESS".parse::<SubtaskStatus>().unwrap(),
            SubtaskStatus::InProgress
        );
    }

    #[test]
    fn test_goal_status_from_str() {
        assert_eq!("Paused".parse::<GoalStatus>(), Ok(GoalStatus::Paused));
        assert!("done".parse::<GoalStatus>().is_err());
    }

    #[test]
    fn test_set_status_stamps_completion() {
        let mut subtask = Subtask::new("Write tests");
        subtask.set_status(SubtaskStatus::Completed);
        let stamped = subtask.completed_at;
        assert!(stamped.is_some());

        subtask.set_status(SubtaskStatus::Completed);
        assert_eq!(subtask.completed_at, stamped);

        subtask.set_status(SubtaskStatus::InProgress);
        assert!(subtask.completed_at.is_none());
    }

    #[test]
    fn test_progress_without_subtasks() {
        let mut goal = Goal::new("g", GoalPriority::Medium, vec![]);
        assert_eq!(goal.progress(), 0);
        goal.status = GoalStatus::Completed;
        assert_eq!(goal.progress(), 100);
    }

    #[test]
    fn test_progress_with_subtasks() {
        let mut goal = Goal::new("g", GoalPriority::High, vec![]);
        goal.subtasks.push(Subtask::new("a"));
        goal.subtasks.push(Subtask::new("b"));
        goal.subtasks.push(Subtask::new("c"));
        goal.subtasks[0].set_status(SubtaskStatus::Completed);
        assert_eq!(goal.progress(), 33);
    }

    #[test]
    fn test_find_subtask_is_case_insensitive() {
        let mut goal = Goal::new("g", GoalPriority::Low, vec![]);
        goal.subtasks.push(Subtask::new("Write Tests"));
        assert!(goal.find_subtask_mut("write tests").is_some());
        assert!(goal.find_subtask_mut("  WRITE TESTS ").is_some());
        assert!(goal.find_subtask_mut("write docs").is_none());
    }

    #[test]
    fn test_artifact_type_field_name() {
        let artifact = Artifact {
            artifact_type: ArtifactType::Test,
            path: "tests/a.rs".into(),
            action: ArtifactAction::Created,
            timestamp: Utc::now(),
            description: None,
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"type\":\"test\""));
        assert!(json.contains("\"action\":\"created\""));
    }
}
