use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contextkeeper::goals::{GoalPriority, GoalStatus};

mod cmd;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "CONTEXTKEEPER_LOG";

#[derive(Parser)]
#[command(name = "contextkeeper")]
#[command(version, about = "Budget-aware context compression and goal tracking for LLM sessions")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .contextkeeper directory with a default configuration
    Init,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// List the goal markers in a summary file
    Markers {
        file: PathBuf,
        /// Print markers and counts as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a conversation's prompt size against the effective limit
    Validate {
        /// Conversation JSON file
        conversation: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compress the oldest messages of a conversation into a checkpoint
    Compress {
        /// Conversation JSON file
        conversation: PathBuf,
        /// Track progress against the active goal in goals.json
        #[arg(long)]
        goal: bool,
        /// Write the result, compressed context and history as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the result as JSON instead of a progress bar
        #[arg(long)]
        json: bool,
    },
    /// Manage goals
    Goals {
        #[command(subcommand)]
        command: Option<GoalsCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default contextkeeper.toml file
    Init,
}

#[derive(Subcommand, Clone)]
pub enum GoalsCommands {
    /// List goals
    List {
        /// Only goals with this status
        #[arg(long)]
        status: Option<GoalStatus>,
    },
    /// Show a goal's subtasks, decisions, artifacts and blockers
    Show { id: String },
    /// Create a goal and make it active
    Create {
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: GoalPriority,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    Pause { id: String },
    Resume { id: String },
    Complete { id: String },
    Abandon {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Apply the markers in a summary file to the active goal
    Track { file: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command)?,
        Commands::Markers { file, json } => cmd::cmd_markers(&file, json)?,
        Commands::Validate { conversation, json } => {
            cmd::cmd_validate(&project_dir, &conversation, json)?
        }
        Commands::Compress {
            conversation,
            goal,
            output,
            json,
        } => {
            cmd::cmd_compress(&project_dir, &conversation, goal, output.as_deref(), json).await?
        }
        Commands::Goals { command } => cmd::cmd_goals(&project_dir, command)?,
    }

    Ok(())
}
