//! Summarizer backed by an LLM command-line tool.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{SummaryOutcome, SummaryRequest, Summarizer, build_summary_prompt};
use crate::config::SummarizerSection;
use crate::tokens::TokenCounter;

/// Pipes the summarization prompt to a CLI such as `claude --print` and
/// reads the summary from stdout.
///
/// The child is spawned with `kill_on_drop`, so a timeout or cancellation
/// terminates it.
pub struct CommandSummarizer {
    command: String,
    args: Vec<String>,
    model: String,
    timeout: Duration,
    counter: Arc<dyn TokenCounter>,
}

impl CommandSummarizer {
    pub fn new(section: &SummarizerSection, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            command: section.command(),
            args: section.args.clone(),
            model: section.model(),
            timeout: Duration::from_secs(section.timeout_secs),
            counter,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, prompt: &str, cancel: &CancellationToken) -> Result<SummaryOutcome> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %self.command, prompt_chars = prompt.len(), "Spawning summarizer");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn summarizer '{}'", self.command))?;

        // Feeding stdin shares the deadline: a child that never reads must
        // not stall the call past the timeout.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(prompt.as_bytes()).await {
                Ok(()) => stdin
                    .shutdown()
                    .await
                    .context("Failed to close summarizer stdin"),
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Summarizer closed stdin before reading the whole prompt");
                    Ok(())
                }
                Err(e) => Err(e).context("Failed to write prompt to summarizer"),
            }
        };
        let exchange = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output.context("Failed to wait for summarizer")
        };

        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, exchange) => match result {
                Ok(output) => output?,
                Err(_) => bail!("Summarizer timed out after {}s", self.timeout.as_secs_f64()),
            },
            _ = cancel.cancelled() => bail!("Summarization cancelled"),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                code = output.status.code().unwrap_or(-1),
                "Summarizer exited unsuccessfully"
            );
            return Ok(SummaryOutcome::failed(
                format!(
                    "Summarizer exited with code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
                &self.model,
            ));
        }

        let summary = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if summary.is_empty() {
            return Ok(SummaryOutcome::failed("Summarizer returned no output", &self.model));
        }

        let token_count = self.counter.count_text(&summary);
        Ok(SummaryOutcome::ok(summary, token_count, &self.model))
    }
}

#[async_trait]
impl Summarizer for CommandSummarizer {
    async fn summarize(
        &self,
        request: &SummaryRequest,
        cancel: &CancellationToken,
    ) -> Result<SummaryOutcome> {
        let prompt = build_summary_prompt(request);
        self.run(&prompt, cancel).await
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
