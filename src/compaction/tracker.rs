//! Context usage tracking for compression decisions.

use serde::Serialize;

/// Tracks a session's running token total against the effective limit.
#[derive(Debug, Clone)]
pub struct ContextTracker {
    /// Provider limit minus safety margin.
    effective_limit: usize,
    /// Fraction of the effective limit at which compression triggers.
    threshold: f64,
    /// Current prompt tokens.
    total_tokens: usize,
    /// Number of successful compressions.
    compressions: u32,
    /// Tokens freed across all compressions.
    tokens_freed: usize,
}

/// Snapshot of a session's context usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUsage {
    pub tokens: usize,
    pub limit: usize,
    pub percentage: f64,
    pub remaining: usize,
    pub compressions: u32,
    pub tokens_freed: usize,
}

impl ContextTracker {
    pub fn new(effective_limit: usize, threshold: f64) -> Self {
        Self {
            effective_limit,
            threshold,
            total_tokens: 0,
            compressions: 0,
            tokens_freed: 0,
        }
    }

    /// Replace the running total with a freshly computed prompt size.
    pub fn set_total(&mut self, tokens: usize) {
        self.total_tokens = tokens;
    }

    pub fn add_tokens(&mut self, tokens: usize) {
        self.total_tokens += tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn effective_limit(&self) -> usize {
        self.effective_limit
    }

    /// Token count at which compression should be attempted.
    pub fn compression_threshold(&self) -> usize {
        (self.effective_limit as f64 * self.threshold).floor() as usize
    }

    pub fn should_compress(&self) -> bool {
        self.total_tokens >= self.compression_threshold()
    }

    /// Record a successful compression.
    pub fn apply_compression(&mut self, freed_tokens: usize) {
        self.total_tokens = self.total_tokens.saturating_sub(freed_tokens);
        self.compressions += 1;
        self.tokens_freed += freed_tokens;
    }

    pub fn usage_percentage(&self) -> f64 {
        if self.effective_limit == 0 {
            return 100.0;
        }
        (self.total_tokens as f64 / self.effective_limit as f64) * 100.0
    }

    pub fn remaining_budget(&self) -> usize {
        self.effective_limit.saturating_sub(self.total_tokens)
    }

    pub fn usage(&self) -> ContextUsage {
        ContextUsage {
            tokens: self.total_tokens,
            limit: self.effective_limit,
            percentage: self.usage_percentage(),
            remaining: self.remaining_budget(),
            compressions: self.compressions,
            tokens_freed: self.tokens_freed,
        }
    }

    /// Status summary for display.
    pub fn status_summary(&self) -> String {
        format!(
            "Context: {:.1}% used ({} / {} tokens), {} compressions{}",
            self.usage_percentage(),
            self.total_tokens,
            self.effective_limit,
            self.compressions,
            if self.compressions > 0 {
                format!(", {} tokens freed", self.tokens_freed)
            } else {
                String::new()
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker() {
        let tracker = ContextTracker::new(7000, 0.8);
        assert_eq!(tracker.total_tokens(), 0);
        assert_eq!(tracker.compression_threshold(), 5600);
        assert!(!tracker.should_compress());
    }

    #[test]
    fn test_should_compress_at_threshold() {
        let mut tracker = ContextTracker::new(10_000, 0.8);
        tracker.add_tokens(7_999);
        assert!(!tracker.should_compress());
        tracker.add_tokens(1);
        assert!(tracker.should_compress());
    }

    #[test]
    fn test_apply_compression() {
        let mut tracker = ContextTracker::new(10_000, 0.8);
        tracker.set_total(9_000);
        tracker.apply_compression(4_000);

        assert_eq!(tracker.total_tokens(), 5_000);
        let usage = tracker.usage();
        assert_eq!(usage.compressions, 1);
        assert_eq!(usage.tokens_freed, 4_000);
        assert_eq!(usage.remaining, 5_000);
        assert!((usage.percentage - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_limit_reports_full() {
        let tracker = ContextTracker::new(0, 0.8);
        assert_eq!(tracker.usage_percentage(), 100.0);
        assert!(tracker.should_compress());
    }

    #[test]
    fn test_status_summary() {
        let mut tracker = ContextTracker::new(8_000, 0.8);
        tracker.add_tokens(4_000);
        let summary = tracker.status_summary();
        assert!(summary.contains("50.0%"));
        assert!(summary.contains("4000 / 8000"));
        assert!(!summary.contains("freed"));

        tracker.apply_compression(1_000);
        assert!(tracker.status_summary().contains("1000 tokens freed"));
    }
}
