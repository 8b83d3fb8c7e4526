//! Stage-proportional progress reporting for the compression pipeline.

use serde::Serialize;
use std::sync::Arc;

/// Pipeline stages in execution order, plus the two terminal/post stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStage {
    Identification,
    Preparation,
    Summarization,
    CheckpointCreation,
    ContextUpdate,
    Validation,
    Complete,
    GoalTracking,
    Error,
}

impl CompressionStage {
    /// Fixed percentage range owned by the stage.
    pub fn range(self) -> (u8, u8) {
        match self {
            CompressionStage::Identification => (0, 15),
            CompressionStage::Preparation => (15, 25),
            CompressionStage::Summarization => (25, 70),
            CompressionStage::CheckpointCreation => (70, 80),
            CompressionStage::ContextUpdate => (80, 90),
            CompressionStage::Validation => (90, 100),
            CompressionStage::Complete
            | CompressionStage::GoalTracking
            | CompressionStage::Error => (100, 100),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionStage::Identification => "identification",
            CompressionStage::Preparation => "preparation",
            CompressionStage::Summarization => "summarization",
            CompressionStage::CheckpointCreation => "checkpoint_creation",
            CompressionStage::ContextUpdate => "context_update",
            CompressionStage::Validation => "validation",
            CompressionStage::Complete => "complete",
            CompressionStage::GoalTracking => "goal_tracking",
            CompressionStage::Error => "error",
        }
    }
}

impl std::fmt::Display for CompressionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress callback: `(stage, percent 0-100, message)`.
///
/// Fire-and-forget; implementations must not panic.
pub type ProgressCallback = Arc<dyn Fn(CompressionStage, u8, &str) + Send + Sync>;

/// Clamps reported percentages into each stage's range and keeps them
/// monotonic across a single `compress` call.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: u8,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback, last: 0 }
    }

    /// Report entry into `stage` at the start of its range.
    pub(crate) fn enter(&mut self, stage: CompressionStage, message: &str) {
        self.report(stage, stage.range().0, message);
    }

    pub(crate) fn report(&mut self, stage: CompressionStage, percent: u8, message: &str) {
        let (lo, hi) = stage.range();
        let percent = percent.clamp(lo, hi).max(self.last);
        self.last = percent;
        if let Some(callback) = &self.callback {
            callback(stage, percent, message);
        }
    }

    /// Report a failure; always at 100%.
    pub(crate) fn error(&mut self, message: &str) {
        self.report(CompressionStage::Error, 100, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<(CompressionStage, u8)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ProgressCallback = Arc::new(move |stage, pct, _msg: &str| {
            sink.lock().unwrap().push((stage, pct));
        });
        (callback, events)
    }

    #[test]
    fn test_stage_ranges_are_contiguous() {
        let ordered = [
            CompressionStage::Identification,
            CompressionStage::Preparation,
            CompressionStage::Summarization,
            CompressionStage::CheckpointCreation,
            CompressionStage::ContextUpdate,
            CompressionStage::Validation,
        ];
        assert_eq!(ordered[0].range().0, 0);
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].range().1, pair[1].range().0);
        }
        assert_eq!(ordered[5].range().1, 100);
    }

    #[test]
    fn test_report_clamps_into_stage_range() {
        let (callback, events) = recording();
        let mut reporter = ProgressReporter::new(Some(callback));

        reporter.report(CompressionStage::Preparation, 5, "too low");
        reporter.report(CompressionStage::Summarization, 99, "too high");

        let events = events.lock().unwrap();
        assert_eq!(events[0], (CompressionStage::Preparation, 15));
        assert_eq!(events[1], (CompressionStage::Summarization, 70));
    }

    #[test]
    fn test_report_is_monotonic() {
        let (callback, events) = recording();
        let mut reporter = ProgressReporter::new(Some(callback));

        reporter.report(CompressionStage::Identification, 12, "a");
        reporter.report(CompressionStage::Identification, 5, "b");

        let events = events.lock().unwrap();
        assert_eq!(events[1].1, 12);
    }

    #[test]
    fn test_error_reports_full() {
        let (callback, events) = recording();
        let mut reporter = ProgressReporter::new(Some(callback));
        reporter.error("boom");
        assert_eq!(events.lock().unwrap()[0], (CompressionStage::Error, 100));
    }

    #[test]
    fn test_no_callback_is_fine() {
        let mut reporter = ProgressReporter::new(None);
        reporter.enter(CompressionStage::Validation, "quiet");
    }
}
