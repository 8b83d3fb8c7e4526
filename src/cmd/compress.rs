//! One-shot compression of a conversation file (`contextkeeper compress`).

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::conversation::Conversation;
use contextkeeper::compaction::{CompressionPipeline, CompressionResult};
use contextkeeper::config::KeeperToml;
use contextkeeper::context::{ActiveContext, ActiveContextState, SessionHistory, SessionHistoryState};
use contextkeeper::goals::{GoalManager, GoalProgressTracker};
use contextkeeper::init::{get_keeper_dir, goals_path, is_initialized, session_history_path};
use contextkeeper::summarizer::CommandSummarizer;
use contextkeeper::tokens::TokenCounterService;
use contextkeeper::ui::CompressionUI;

/// Written by `--output`.
#[derive(Serialize)]
struct CompressedSession<'a> {
    result: &'a CompressionResult,
    context: ActiveContextState,
    history: SessionHistoryState,
}

pub async fn cmd_compress(
    project_dir: &Path,
    file: &Path,
    track_goal: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = KeeperToml::load_or_default(&get_keeper_dir(project_dir))?;
    let counter = TokenCounterService::from_section(&config.tokens)?;
    let summarizer = Arc::new(CommandSummarizer::new(&config.summarizer, counter.clone()));
    let mut pipeline =
        CompressionPipeline::new(config.compression_settings()?, counter.clone(), summarizer);

    let goals_file = goals_path(project_dir);
    let mut goals = if track_goal && config.goals.enabled {
        pipeline = pipeline.with_goal_tracker(GoalProgressTracker::new());
        Some(GoalManager::load(&goals_file, config.goals.clone())?)
    } else {
        None
    };
    if let Some(manager) = &goals
        && manager.active_goal().is_none()
    {
        warn!("--goal given but no goal is active; progress will not be tracked");
    }

    let (mut context, mut history) = Conversation::load(file)?.into_session(counter)?;
    let ledger = if is_initialized(project_dir) {
        let path = session_history_path(project_dir, &history.history().session_id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        history = history.with_file(&path);
        history.save()?;
        Some(path)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let ui = if json {
        CompressionUI::hidden()
    } else {
        CompressionUI::new()
    };
    let goal = goals.as_mut().and_then(|manager| manager.active_goal_mut());
    let result = pipeline
        .compress(&mut context, &mut history, goal, &cancel, Some(ui.callback()))
        .await;
    ui.finish(&result);
    if let Some(path) = &ledger
        && !json
    {
        println!("Session ledger: {}", path.display());
    }

    if let Some(manager) = goals.as_mut()
        && let Some(tracking) = &result.goal_progress
    {
        if let Some(goal_id) = manager.active_goal_id().map(str::to_string) {
            manager.record_tracking(&goal_id, tracking);
        }
        manager.save(&goals_file)?;
    }

    if let Some(path) = output {
        let session = CompressedSession {
            result: &result,
            context: context.state(),
            history: history.history(),
        };
        let content = serde_json::to_string_pretty(&session)
            .context("Failed to serialize compressed session")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if !result.success && !result.is_noop() {
        bail!(
            "{}",
            result
                .error
                .as_deref()
                .or(result.reason.as_deref())
                .unwrap_or("Compression failed")
        );
    }
    Ok(())
}
