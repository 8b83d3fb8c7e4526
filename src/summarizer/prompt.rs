//! Summarization prompt construction.

use std::fmt::Write;

use super::SummaryRequest;
use crate::compaction::CompressionLevel;
use crate::goals::{Goal, SubtaskStatus};

fn level_instructions(level: CompressionLevel) -> &'static str {
    match level {
        CompressionLevel::Compact => {
            "Produce a compact summary. Keep only decisions, outcomes, open problems and \
             file names. Drop explanations, code and conversational detail."
        }
        CompressionLevel::Moderate => {
            "Produce a moderately detailed summary. Keep decisions with their rationale, \
             outcomes, open problems, file names and any short identifiers the conversation \
             relies on. Drop long code and repeated discussion."
        }
        CompressionLevel::Detailed => {
            "Produce a detailed summary. Preserve the sequence of work, decisions with their \
             rationale, errors encountered and how they were resolved, file names, and any \
             exact values, names or commands that later messages may depend on."
        }
    }
}

fn write_goal_context(prompt: &mut String, goal: &Goal) {
    let _ = writeln!(prompt, "## Current goal\n\n{}\n", goal.description);

    if !goal.subtasks.is_empty() {
        let _ = writeln!(prompt, "Subtasks:");
        for subtask in &goal.subtasks {
            let mark = if subtask.status == SubtaskStatus::Completed {
                "x"
            } else {
                " "
            };
            let _ = writeln!(
                prompt,
                "- [{}] {} ({})",
                mark, subtask.description, subtask.status
            );
        }
        prompt.push('\n');
    }

    let locked: Vec<&str> = goal
        .decisions
        .iter()
        .filter(|d| d.locked)
        .map(|d| d.description.as_str())
        .collect();
    if !locked.is_empty() {
        let _ = writeln!(prompt, "Locked decisions (do not revisit):");
        for decision in locked {
            let _ = writeln!(prompt, "- {}", decision);
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Report goal progress found in the conversation with these markers, one per line, \
         after the summary:\n\
         [CHECKPOINT] <subtask description> - <COMPLETED|IN-PROGRESS|PENDING|BLOCKED>\n\
         [DECISION] <decision> (append \" - LOCKED\" when the decision is final)\n\
         [ARTIFACT] <Created|Modified|Deleted> <path>\n\
         Reuse the exact subtask descriptions listed above when they apply.\n\n",
    );
}

/// Build the prompt sent to the summarizer.
pub fn build_summary_prompt(request: &SummaryRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are compressing the earlier part of a conversation so that it fits in a \
         limited context window. The summary replaces the original messages, so anything \
         you leave out is lost.\n\n",
    );
    let _ = writeln!(prompt, "{}\n", level_instructions(request.level));
    let _ = writeln!(
        prompt,
        "Keep the summary under {} tokens. Output only the summary.\n",
        request.max_summary_tokens
    );

    if let Some(goal) = &request.goal {
        write_goal_context(&mut prompt, goal);
    }

    prompt.push_str("## Conversation\n\n");
    for message in &request.messages {
        let _ = writeln!(prompt, "[{}] {}\n", message.role, message.content);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::{Decision, GoalPriority, Subtask};
    use crate::message::Message;

    fn request(level: CompressionLevel, goal: Option<Goal>) -> SummaryRequest {
        SummaryRequest {
            messages: vec![
                Message::user("Please add a parser"),
                Message::assistant("Added src/parser.rs"),
            ],
            level,
            goal,
            max_summary_tokens: 420,
        }
    }

    #[test]
    fn test_prompt_includes_messages_and_cap() {
        let prompt = build_summary_prompt(&request(CompressionLevel::Detailed, None));
        assert!(prompt.contains("[user] Please add a parser"));
        assert!(prompt.contains("[assistant] Added src/parser.rs"));
        assert!(prompt.contains("under 420 tokens"));
        assert!(!prompt.contains("[CHECKPOINT]"));
    }

    #[test]
    fn test_levels_differ() {
        let compact = build_summary_prompt(&request(CompressionLevel::Compact, None));
        let detailed = build_summary_prompt(&request(CompressionLevel::Detailed, None));
        assert!(compact.contains("compact summary"));
        assert!(detailed.contains("detailed summary"));
    }

    #[test]
    fn test_goal_context_and_marker_instructions() {
        let mut goal = Goal::new("Ship the parser", GoalPriority::High, vec![]);
        goal.subtasks.push(Subtask::new("Write tests"));
        let mut decision = Decision::new("Use regex crate");
        decision.lock();
        goal.decisions.push(decision);

        let prompt = build_summary_prompt(&request(CompressionLevel::Moderate, Some(goal)));
        assert!(prompt.contains("Ship the parser"));
        assert!(prompt.contains("- [ ] Write tests (pending)"));
        assert!(prompt.contains("- Use regex crate"));
        assert!(prompt.contains("[CHECKPOINT] <subtask description>"));
        assert!(prompt.find("## Current goal") < prompt.find("## Conversation"));
    }
}
