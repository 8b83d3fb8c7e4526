//! Goal tracking across compressions.
//!
//! Goals carry the user's intent through context compression. Summaries
//! produced by the summarizer contain `[CHECKPOINT]`, `[DECISION]` and
//! `[ARTIFACT]` markers which the [`GoalProgressTracker`] applies to the
//! active goal.

pub mod manager;
pub mod markers;
pub mod tracker;
pub mod types;

pub use manager::GoalManager;
pub use markers::{GoalMarkerParser, MarkerStats, ParsedGoalUpdate, extract_markers};
pub use tracker::{GoalProgressTracker, TrackingResult, infer_artifact_type};
pub use types::{
    Artifact, ArtifactAction, ArtifactType, Blocker, BlockerType, Decision, Goal, GoalCheckpoint,
    GoalPriority, GoalStatus, Subtask, SubtaskStatus,
};
