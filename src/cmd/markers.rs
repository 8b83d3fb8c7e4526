//! Goal marker extraction (`contextkeeper markers`).

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;

use contextkeeper::goals::{GoalMarkerParser, MarkerStats, ParsedGoalUpdate};
use contextkeeper::ui::icons::{ARTIFACT, CHECKPOINT, DECISION};

#[derive(Serialize)]
struct MarkerReport {
    updates: Vec<ParsedGoalUpdate>,
    stats: MarkerStats,
}

pub fn cmd_markers(file: &std::path::Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let parser = GoalMarkerParser::new();
    let report = MarkerReport {
        updates: parser.parse(&text),
        stats: parser.stats(&text),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.updates.is_empty() {
        println!("No goal markers found in {}", file.display());
        return Ok(());
    }

    for update in &report.updates {
        let icon = match update {
            ParsedGoalUpdate::Checkpoint { .. } => &CHECKPOINT,
            ParsedGoalUpdate::Decision { .. } => &DECISION,
            ParsedGoalUpdate::Artifact { .. } => &ARTIFACT,
        };
        println!("{}{}", icon, update);
    }
    println!();
    println!(
        "{} markers: {} checkpoints, {} decisions, {} artifacts",
        style(report.stats.total).bold(),
        report.stats.checkpoints,
        report.stats.decisions,
        report.stats.artifacts
    );

    Ok(())
}
