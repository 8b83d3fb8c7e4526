//! Configuration view and validation commands (`contextkeeper config`).

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use contextkeeper::config::{CONFIG_FILE, KeeperToml};
    use contextkeeper::init::get_keeper_dir;

    let keeper_dir = get_keeper_dir(project_dir);
    let config_path = keeper_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("contextkeeper Configuration");
            println!("===========================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                KeeperToml::load(&config_path)?
            } else {
                println!("No contextkeeper.toml found at {}", config_path.display());
                println!("Using default configuration.");
                KeeperToml::default()
            };
            println!();

            println!("[context]");
            match toml.context.ollama_limit {
                Some(limit) => println!("  ollama_limit = {}", limit),
                None => println!("  ollama_limit = (not set)"),
            }
            println!(
                "  keep_recent_percentage = {}",
                toml.context.keep_recent_percentage
            );
            println!("  safety_margin = {}", toml.context.safety_margin);
            println!(
                "  compression_threshold = {}",
                toml.context.compression_threshold
            );
            println!("  auto_compress = {}", toml.context.auto_compress);
            println!();

            println!("[goals]");
            println!("  enabled = {}", toml.goals.enabled);
            println!("  max_completed_goals = {}", toml.goals.max_completed_goals);
            println!(
                "  max_checkpoints_per_goal = {}",
                toml.goals.max_checkpoints_per_goal
            );
            println!("  auto_checkpoint = {}", toml.goals.auto_checkpoint);
            println!(
                "  auto_checkpoint_interval = {}",
                toml.goals.auto_checkpoint_interval
            );
            println!();

            println!("[summarizer]");
            println!("  command = \"{}\"", toml.summarizer.command());
            if !toml.summarizer.args.is_empty() {
                println!("  args = {:?}", toml.summarizer.args);
            }
            println!("  model = \"{}\"", toml.summarizer.model());
            println!("  timeout_secs = {}", toml.summarizer.timeout_secs);
            println!();

            println!("[tokens]");
            println!("  encoding = \"{}\"", toml.tokens.encoding);
            println!("  chars_per_token = {}", toml.tokens.chars_per_token);
            println!();

            if let Ok(settings) = toml.compression_settings() {
                println!("Effective values:");
                println!("  effective_limit = {}", settings.effective_limit());
                println!("  keep_budget = {}", settings.keep_budget());
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                KeeperToml::load(&config_path)?
            } else {
                println!("No contextkeeper.toml found. Checking defaults.");
                KeeperToml::default()
            };
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
            println!();

            toml.compression_settings()?;
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!(
                    "contextkeeper.toml already exists at {}",
                    config_path.display()
                );
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&keeper_dir)?;
            KeeperToml::starter().save(&config_path)?;

            println!("Created contextkeeper.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [context] ollama_limit, keep_recent_percentage, safety_margin");
            println!("  - [goals] enabled, auto_checkpoint_interval");
            println!("  - [summarizer] command, args, model, timeout_secs");
            println!();
        }
    }

    Ok(())
}
