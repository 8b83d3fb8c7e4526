//! Compression pipeline settings.

use crate::errors::ConfigError;
use crate::validation::DEFAULT_SAFETY_MARGIN;

/// Share of the limit kept uncompressed when nothing else is configured.
pub const DEFAULT_KEEP_RECENT_PERCENTAGE: f64 = 0.5;

/// Inclusive bounds for `keep_recent_percentage`.
pub const MIN_KEEP_RECENT_PERCENTAGE: f64 = 0.1;
pub const MAX_KEEP_RECENT_PERCENTAGE: f64 = 0.9;

/// Check a keep-recent percentage against its bounds.
pub fn validate_keep_recent_percentage(pct: f64) -> Result<f64, ConfigError> {
    if !(MIN_KEEP_RECENT_PERCENTAGE..=MAX_KEEP_RECENT_PERCENTAGE).contains(&pct) {
        return Err(ConfigError::KeepRecentOutOfRange(pct));
    }
    Ok(pct)
}

/// Token budget settings for the compression pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    ollama_limit: usize,
    keep_recent_percentage: f64,
    safety_margin: usize,
}

impl CompressionSettings {
    /// Create settings for a provider limit with default percentage and margin.
    pub fn new(ollama_limit: usize) -> Result<Self, ConfigError> {
        if ollama_limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(Self {
            ollama_limit,
            keep_recent_percentage: DEFAULT_KEEP_RECENT_PERCENTAGE,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        })
    }

    pub fn with_keep_recent_percentage(mut self, pct: f64) -> Result<Self, ConfigError> {
        self.set_keep_recent_percentage(pct)?;
        Ok(self)
    }

    pub fn with_safety_margin(mut self, margin: usize) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Change the keep-recent percentage; out-of-range values are rejected
    /// and leave the current value in place.
    pub fn set_keep_recent_percentage(&mut self, pct: f64) -> Result<(), ConfigError> {
        self.keep_recent_percentage = validate_keep_recent_percentage(pct)?;
        Ok(())
    }

    pub fn ollama_limit(&self) -> usize {
        self.ollama_limit
    }

    pub fn keep_recent_percentage(&self) -> f64 {
        self.keep_recent_percentage
    }

    pub fn safety_margin(&self) -> usize {
        self.safety_margin
    }

    /// Tokens reserved for uncompressed recent messages.
    pub fn keep_budget(&self) -> usize {
        (self.ollama_limit as f64 * self.keep_recent_percentage).floor() as usize
    }

    /// Provider limit minus the safety margin.
    pub fn effective_limit(&self) -> usize {
        self.ollama_limit.saturating_sub(self.safety_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CompressionSettings::new(8000).unwrap();
        assert_eq!(settings.keep_recent_percentage(), 0.5);
        assert_eq!(settings.safety_margin(), 1000);
        assert_eq!(settings.keep_budget(), 4000);
        assert_eq!(settings.effective_limit(), 7000);
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert_eq!(CompressionSettings::new(0), Err(ConfigError::ZeroLimit));
    }

    #[test]
    fn test_keep_budget_floors() {
        let settings = CompressionSettings::new(6963).unwrap();
        assert_eq!(settings.keep_budget(), 3481);
    }

    #[test]
    fn test_percentage_bounds_are_inclusive() {
        let mut settings = CompressionSettings::new(1000).unwrap();
        assert!(settings.set_keep_recent_percentage(0.1).is_ok());
        assert!(settings.set_keep_recent_percentage(0.9).is_ok());
        assert_eq!(settings.keep_budget(), 900);
    }

    #[test]
    fn test_out_of_range_percentage_keeps_previous_value() {
        let mut settings = CompressionSettings::new(1000).unwrap();
        settings.set_keep_recent_percentage(0.3).unwrap();

        assert_eq!(
            settings.set_keep_recent_percentage(0.95),
            Err(ConfigError::KeepRecentOutOfRange(0.95))
        );
        assert!(settings.set_keep_recent_percentage(0.0).is_err());
        assert!(settings.set_keep_recent_percentage(f64::NAN).is_err());
        assert_eq!(settings.keep_recent_percentage(), 0.3);
    }
}
