use crate::compaction::{CompressionResult, CompressionStage, ProgressCallback};
use crate::ui::icons::{CHECK, CROSS, SKIP, SPARKLE};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Terminal progress for a single compression, rendered with `indicatif`.
///
/// The bar runs 0 to 100 and follows the pipeline's stage-proportional
/// progress. Hand [`CompressionUI::callback`] to `compress`.
pub struct CompressionUI {
    bar: ProgressBar,
}

impl CompressionUI {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix("Compress");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A UI that draws nothing, for `--json` and non-interactive output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Progress callback that drives this bar.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Arc::new(move |stage: CompressionStage, percent: u8, message: &str| {
            bar.set_position(u64::from(percent));
            bar.set_message(format!("{} {}", style(stage).yellow(), style(message).dim()));
        })
    }

    /// Clear the bar and print a one-line outcome.
    pub fn finish(&self, result: &CompressionResult) {
        self.bar.finish_and_clear();
        if self.bar.is_hidden() {
            return;
        }

        let reason = result.reason.as_deref().unwrap_or("unknown");
        if result.success {
            let freed = result.freed_tokens.unwrap_or_default();
            println!(
                "{}{} {} tokens freed",
                CHECK,
                style("Compression complete:").green().bold(),
                style(freed).cyan()
            );
        } else if result.is_noop() {
            println!("{}{}", SKIP, style(reason).dim());
        } else {
            println!("{}{}", CROSS, style(reason).red().bold());
            if let Some(error) = &result.error {
                println!("    {}", style(error).dim());
            }
        }

        if let Some(tracking) = &result.goal_progress
            && tracking.updates_applied > 0
        {
            println!(
                "{}{} goal updates applied",
                SPARKLE,
                style(tracking.updates_applied).cyan()
            );
        }
    }
}

impl Default for CompressionUI {
    fn default() -> Self {
        Self::new()
    }
}
