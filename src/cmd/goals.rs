//! Goal management against `.contextkeeper/goals.json` (`contextkeeper goals`).

use anyhow::{Context, Result, bail};
use console::style;

use super::super::GoalsCommands;
use contextkeeper::config::KeeperToml;
use contextkeeper::goals::{Goal, GoalManager, GoalStatus};
use contextkeeper::init::{get_keeper_dir, goals_path};
use contextkeeper::ui::icons::{BLOCKER, CHECK, CROSS, GOAL, PROGRESS};

pub fn cmd_goals(project_dir: &std::path::Path, command: Option<GoalsCommands>) -> Result<()> {
    let config = KeeperToml::load_or_default(&get_keeper_dir(project_dir))?;
    let path = goals_path(project_dir);
    let mut manager = GoalManager::load(&path, config.goals)?;

    match command {
        None => list(&manager, None),
        Some(GoalsCommands::List { status }) => list(&manager, status),
        Some(GoalsCommands::Show { id }) => {
            let id = resolve_id(&manager, &id)?;
            if let Some(goal) = manager.goal(&id) {
                show(goal);
            }
        }
        Some(GoalsCommands::Create {
            description,
            priority,
            tags,
        }) => {
            let id = manager.create_goal(description, priority, tags)?;
            manager.save(&path)?;
            println!("{}Created goal {}", GOAL, style(&id).cyan());
        }
        Some(GoalsCommands::Pause { id }) => {
            let id = resolve_id(&manager, &id)?;
            manager.pause_goal(&id)?;
            manager.save(&path)?;
            println!("Paused goal {}", style(&id).cyan());
        }
        Some(GoalsCommands::Resume { id }) => {
            let id = resolve_id(&manager, &id)?;
            let status = manager.resume_goal(&id)?;
            manager.save(&path)?;
            if status == GoalStatus::Blocked {
                println!(
                    "{}Goal {} has unresolved blockers and is now blocked",
                    BLOCKER,
                    style(&id).cyan()
                );
            } else {
                println!("Resumed goal {}", style(&id).cyan());
            }
        }
        Some(GoalsCommands::Complete { id }) => {
            let id = resolve_id(&manager, &id)?;
            manager.complete_goal(&id)?;
            manager.save(&path)?;
            println!("{}Completed goal {}", CHECK, style(&id).cyan());
        }
        Some(GoalsCommands::Abandon { id, reason }) => {
            let id = resolve_id(&manager, &id)?;
            manager.abandon_goal(&id, reason)?;
            manager.save(&path)?;
            println!("{}Abandoned goal {}", CROSS, style(&id).cyan());
        }
        Some(GoalsCommands::Track { file }) => {
            let summary = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let Some(result) = manager.apply_summary(&summary) else {
                bail!("No active goal to track progress against");
            };
            manager.save(&path)?;

            println!(
                "{}{} updates applied",
                PROGRESS,
                style(result.updates_applied).cyan()
            );
            for failure in &result.failures {
                println!("  {} {}", style("!").yellow(), failure);
            }
            if let Some(error) = result.error {
                bail!(error);
            }
        }
    }

    Ok(())
}

/// Accept a full id or a unique prefix of one.
fn resolve_id(manager: &GoalManager, id: &str) -> Result<String> {
    if manager.goal(id).is_some() {
        return Ok(id.to_string());
    }
    let matches: Vec<&Goal> = manager
        .goals()
        .iter()
        .filter(|g| g.id.starts_with(id))
        .collect();
    match matches.as_slice() {
        [goal] => Ok(goal.id.clone()),
        [] => bail!("Goal {} not found", id),
        _ => bail!("Goal id prefix {} is ambiguous", id),
    }
}

fn list(manager: &GoalManager, status: Option<GoalStatus>) {
    let goals = manager.list_goals(status);
    if goals.is_empty() {
        println!("No goals.");
        return;
    }

    for goal in goals {
        let marker = if manager.active_goal_id() == Some(goal.id.as_str()) {
            style("*").green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {} {:<9} {:>3}%  [{}] {}",
            marker,
            style(short_id(&goal.id)).dim(),
            goal.status,
            goal.progress(),
            goal.priority,
            goal.description
        );
    }
}

fn show(goal: &Goal) {
    println!();
    println!("{}{}", GOAL, style(&goal.description).bold());
    println!("  id:       {}", goal.id);
    println!("  status:   {}", goal.status);
    println!("  priority: {}", goal.priority);
    println!("  progress: {}%", goal.progress());
    if !goal.tags.is_empty() {
        println!("  tags:     {}", goal.tags.join(", "));
    }
    if let Some(reason) = &goal.abandon_reason {
        println!("  reason:   {}", reason);
    }

    if !goal.subtasks.is_empty() {
        println!();
        println!("Subtasks:");
        for subtask in &goal.subtasks {
            println!("  - {} ({})", subtask.description, subtask.status);
        }
    }
    if !goal.decisions.is_empty() {
        println!();
        println!("Decisions:");
        for decision in &goal.decisions {
            let lock = if decision.locked { " [locked]" } else { "" };
            println!("  - {}{}", decision.description, lock);
        }
    }
    if !goal.artifacts.is_empty() {
        println!();
        println!("Artifacts:");
        for artifact in &goal.artifacts {
            println!("  - {} {} ({})", artifact.action, artifact.path, artifact.artifact_type);
        }
    }
    let blockers: Vec<_> = goal.blockers.iter().filter(|b| !b.is_resolved()).collect();
    if !blockers.is_empty() {
        println!();
        println!("Blockers:");
        for blocker in blockers {
            println!("  {}{}", BLOCKER, blocker.description);
        }
    }
    println!();
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
