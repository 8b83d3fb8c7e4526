//! Project initialization for contextkeeper.
//!
//! `contextkeeper init` creates the `.contextkeeper/` directory:
//!
//! ```text
//! .contextkeeper/
//! ├── contextkeeper.toml   # Configuration (starter file written on first init)
//! ├── goals.json           # Goal ledger, created by the first `goals` command
//! └── sessions/            # Session ledgers written by `compress`, one per conversation
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, KeeperToml};

/// The name of the contextkeeper directory.
pub const KEEPER_DIR: &str = ".contextkeeper";

/// File holding the serialized goal manager.
pub const GOALS_FILE: &str = "goals.json";

/// Directory holding per-session history ledgers.
pub const SESSIONS_DIR: &str = "sessions";

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the `.contextkeeper` directory
    pub keeper_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

/// Initialize contextkeeper in `project_dir`.
///
/// Missing parts of an existing directory are filled in; an existing
/// `contextkeeper.toml` is never overwritten.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let keeper_dir = get_keeper_dir(project_dir);
    let created = !keeper_dir.exists();

    std::fs::create_dir_all(&keeper_dir)
        .with_context(|| format!("Failed to create directory: {}", keeper_dir.display()))?;
    ensure_directory_structure(&keeper_dir)?;

    Ok(InitResult {
        keeper_dir,
        created,
    })
}

fn ensure_directory_structure(keeper_dir: &Path) -> Result<()> {
    let sessions_dir = keeper_dir.join(SESSIONS_DIR);
    std::fs::create_dir_all(&sessions_dir).with_context(|| {
        format!(
            "Failed to create sessions directory: {}",
            sessions_dir.display()
        )
    })?;

    let config_file = keeper_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        KeeperToml::starter().save(&config_file)?;
    }

    Ok(())
}

/// Check if a project is already initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    get_keeper_dir(project_dir).exists()
}

/// Get the path to the `.contextkeeper` directory for a project.
pub fn get_keeper_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(KEEPER_DIR)
}

/// Path to the goal ledger for a project.
pub fn goals_path(project_dir: &Path) -> PathBuf {
    get_keeper_dir(project_dir).join(GOALS_FILE)
}

/// Path to the history ledger of one session.
pub fn session_history_path(project_dir: &Path, session_id: &str) -> PathBuf {
    get_keeper_dir(project_dir)
        .join(SESSIONS_DIR)
        .join(format!("{}.json", session_id))
}
