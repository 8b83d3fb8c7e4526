//! Prompt size check (`contextkeeper validate`).

use anyhow::{Result, bail};
use console::style;
use serde::Serialize;

use super::conversation::Conversation;
use contextkeeper::compaction::{ContextTracker, ContextUsage};
use contextkeeper::config::KeeperToml;
use contextkeeper::context::ActiveContext;
use contextkeeper::init::get_keeper_dir;
use contextkeeper::tokens::TokenCounterService;
use contextkeeper::ui::icons::{CHECK, CROSS, PROGRESS};
use contextkeeper::validation::{ValidationResult, ValidationService};

#[derive(Serialize)]
struct ValidateReport {
    validation: ValidationResult,
    usage: ContextUsage,
    should_compress: bool,
}

pub fn cmd_validate(project_dir: &std::path::Path, file: &std::path::Path, json: bool) -> Result<()> {
    let config = KeeperToml::load_or_default(&get_keeper_dir(project_dir))?;
    let settings = config.compression_settings()?;
    let counter = TokenCounterService::from_section(&config.tokens)?;

    let (context, _) = Conversation::load(file)?.into_session(counter.clone())?;
    let validator = ValidationService::new(settings.ollama_limit(), settings.safety_margin(), counter);
    let validation = validator.validate_prompt_size(&context.build_prompt());

    let mut tracker =
        ContextTracker::new(settings.effective_limit(), config.context.compression_threshold);
    tracker.set_total(context.state().token_count.total);
    let report = ValidateReport {
        validation,
        usage: tracker.usage(),
        should_compress: tracker.should_compress(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(overage) = report.validation.overage {
        bail!("Prompt exceeds the effective limit by {} tokens", overage);
    }
    Ok(())
}

fn print_report(report: &ValidateReport) {
    let validation = &report.validation;
    println!();
    if validation.valid {
        println!(
            "{}{} {} / {} tokens",
            CHECK,
            style("Prompt fits:").green().bold(),
            validation.tokens,
            validation.limit
        );
    } else {
        println!(
            "{}{} {} / {} tokens",
            CROSS,
            style("Prompt too large:").red().bold(),
            validation.tokens,
            validation.limit
        );
    }
    println!("{}{:.1}% of the effective limit used", PROGRESS, report.usage.percentage);
    if report.should_compress {
        println!("  Compression recommended (threshold crossed)");
    }

    if let Some(suggestions) = &validation.suggestions {
        println!();
        println!("Suggested actions:");
        for suggestion in suggestions {
            println!(
                "  {}. {} {} (saves ~{} tokens)",
                suggestion.priority,
                style(suggestion.action).yellow(),
                suggestion.description,
                suggestion.estimated_savings
            );
        }
    }
    println!();
}
