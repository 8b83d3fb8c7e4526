//! Unified configuration for contextkeeper.
//!
//! Settings are read from `.contextkeeper/contextkeeper.toml`. Every key falls
//! back to a default except `[context] ollama_limit`, which must be set before
//! anything can be compressed or validated.
//!
//! # Configuration File Format
//!
//! ```toml
//! [context]
//! ollama_limit = 8192
//! keep_recent_percentage = 0.5
//! safety_margin = 1000
//! compression_threshold = 0.8
//! auto_compress = true
//!
//! [goals]
//! enabled = true
//! max_completed_goals = 10
//! max_checkpoints_per_goal = 20
//! auto_checkpoint = true
//! auto_checkpoint_interval = 5
//!
//! [summarizer]
//! command = "claude"
//! args = ["--print"]
//! timeout_secs = 120
//!
//! [tokens]
//! encoding = "cl100k"
//! chars_per_token = 4
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compaction::{CompressionSettings, validate_keep_recent_percentage};
use crate::errors::ConfigError;

/// Name of the configuration file inside the project directory.
pub const CONFIG_FILE: &str = "contextkeeper.toml";

/// Context window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// Hard token limit of the provider's context window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_limit: Option<usize>,
    /// Share of the limit reserved for uncompressed recent messages
    #[serde(default = "default_keep_recent_percentage")]
    pub keep_recent_percentage: f64,
    /// Tokens reserved for the model's response
    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,
    /// Fraction of the effective limit at which compression triggers
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,
    /// Compress automatically when a new message crosses the threshold
    #[serde(default = "default_auto_compress")]
    pub auto_compress: bool,
}

/// Limit written into the starter file by `init`.
pub const STARTER_OLLAMA_LIMIT: usize = 8192;

fn default_keep_recent_percentage() -> f64 {
    crate::compaction::DEFAULT_KEEP_RECENT_PERCENTAGE
}

fn default_safety_margin() -> usize {
    crate::validation::DEFAULT_SAFETY_MARGIN
}

fn default_compression_threshold() -> f64 {
    0.8
}

fn default_auto_compress() -> bool {
    true
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            ollama_limit: None,
            keep_recent_percentage: default_keep_recent_percentage(),
            safety_margin: default_safety_margin(),
            compression_threshold: default_compression_threshold(),
            auto_compress: default_auto_compress(),
        }
    }
}

/// Goal management settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalsSection {
    #[serde(default = "default_goals_enabled")]
    pub enabled: bool,
    /// Completed or abandoned goals kept before the oldest are evicted
    #[serde(default = "default_max_completed_goals")]
    pub max_completed_goals: usize,
    /// Progress checkpoints kept per goal
    #[serde(default = "default_max_checkpoints_per_goal")]
    pub max_checkpoints_per_goal: usize,
    /// Record checkpoints automatically as marker updates arrive
    #[serde(default = "default_auto_checkpoint")]
    pub auto_checkpoint: bool,
    /// Applied marker updates between automatic checkpoints
    #[serde(default = "default_auto_checkpoint_interval")]
    pub auto_checkpoint_interval: usize,
}

fn default_goals_enabled() -> bool {
    true
}

fn default_max_completed_goals() -> usize {
    10
}

fn default_max_checkpoints_per_goal() -> usize {
    20
}

fn default_auto_checkpoint() -> bool {
    true
}

fn default_auto_checkpoint_interval() -> usize {
    5
}

impl Default for GoalsSection {
    fn default() -> Self {
        Self {
            enabled: default_goals_enabled(),
            max_completed_goals: default_max_completed_goals(),
            max_checkpoints_per_goal: default_max_checkpoints_per_goal(),
            auto_checkpoint: default_auto_checkpoint(),
            auto_checkpoint_interval: default_auto_checkpoint_interval(),
        }
    }
}

/// External summarizer command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerSection {
    /// LLM CLI command (default: `SUMMARIZER_CMD` env, then "claude")
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed before the prompt is piped to stdin
    #[serde(default = "default_summarizer_args")]
    pub args: Vec<String>,
    /// Model name recorded in checkpoint metadata
    #[serde(default)]
    pub model: Option<String>,
    /// Seconds before a summarization call is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_summarizer_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for SummarizerSection {
    fn default() -> Self {
        Self {
            command: None,
            args: default_summarizer_args(),
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SummarizerSection {
    /// The summarizer command, with fallback to the environment.
    pub fn command(&self) -> String {
        self.command
            .clone()
            .or_else(|| std::env::var("SUMMARIZER_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Model label for checkpoint metadata.
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| self.command())
    }
}

/// Token encodings available to the default counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenEncoding {
    /// `cl100k_base` BPE via tiktoken
    #[default]
    Cl100k,
    /// Character-count estimate
    Chars,
}

impl std::fmt::Display for TokenEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenEncoding::Cl100k => write!(f, "cl100k"),
            TokenEncoding::Chars => write!(f, "chars"),
        }
    }
}

impl std::str::FromStr for TokenEncoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" => Ok(TokenEncoding::Cl100k),
            "chars" => Ok(TokenEncoding::Chars),
            _ => anyhow::bail!("Invalid token encoding '{}'. Valid values: cl100k, chars", s),
        }
    }
}

/// Token counter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensSection {
    #[serde(default)]
    pub encoding: TokenEncoding,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

fn default_chars_per_token() -> usize {
    crate::tokens::DEFAULT_CHARS_PER_TOKEN
}

impl Default for TokensSection {
    fn default() -> Self {
        Self {
            encoding: TokenEncoding::default(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

/// Root of `contextkeeper.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeeperToml {
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub goals: GoalsSection,
    #[serde(default)]
    pub summarizer: SummarizerSection,
    #[serde(default)]
    pub tokens: TokensSection,
}

impl KeeperToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse contextkeeper.toml")
    }

    /// Load configuration from `<dir>/contextkeeper.toml`.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Configuration written by `init`: defaults plus an explicit `ollama_limit`.
    pub fn starter() -> Self {
        let mut config = Self::default();
        config.context.ollama_limit = Some(STARTER_OLLAMA_LIMIT);
        config
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize contextkeeper.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Build validated compression settings from the `[context]` section.
    pub fn compression_settings(&self) -> Result<CompressionSettings, ConfigError> {
        if self.context.compression_threshold <= 0.0 || self.context.compression_threshold > 1.0 {
            return Err(ConfigError::ThresholdOutOfRange(
                self.context.compression_threshold,
            ));
        }
        let limit = self.context.ollama_limit.ok_or(ConfigError::MissingLimit)?;
        CompressionSettings::new(limit)?
            .with_keep_recent_percentage(self.context.keep_recent_percentage)
            .map(|s| s.with_safety_margin(self.context.safety_margin))
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.context.ollama_limit {
            None => warnings.push(ConfigError::MissingLimit.to_string()),
            Some(0) => warnings.push(ConfigError::ZeroLimit.to_string()),
            Some(limit) if self.context.safety_margin >= limit => warnings.push(format!(
                "safety_margin ({}) leaves no room under ollama_limit ({})",
                self.context.safety_margin, limit
            )),
            Some(_) => {}
        }

        if let Err(e) = validate_keep_recent_percentage(self.context.keep_recent_percentage) {
            warnings.push(e.to_string());
        }

        if self.context.compression_threshold <= 0.0 || self.context.compression_threshold > 1.0 {
            warnings.push(
                ConfigError::ThresholdOutOfRange(self.context.compression_threshold).to_string(),
            );
        }

        if self.goals.auto_checkpoint && self.goals.auto_checkpoint_interval == 0 {
            warnings.push("auto_checkpoint_interval must be at least 1".to_string());
        }

        if self.tokens.encoding == TokenEncoding::Chars && self.tokens.chars_per_token == 0 {
            warnings.push(ConfigError::ZeroCharsPerToken.to_string());
        }

        warnings
    }
}
