//! Project initialization (`contextkeeper init`).

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use contextkeeper::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized contextkeeper at {}",
            result.keeper_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .contextkeeper/");
        println!("  ├── contextkeeper.toml   # Limits, goals and summarizer settings");
        println!("  └── sessions/            # Session ledgers written by `compress`");
        println!();
        println!("Next steps:");
        println!("  1. Set [context] ollama_limit in contextkeeper.toml");
        println!("  2. Run `contextkeeper goals create \"<goal>\"` to track a goal");
        println!("  3. Run `contextkeeper compress <conversation.json>`");
    } else if was_initialized {
        println!(
            "contextkeeper already initialized at {}",
            result.keeper_dir.display()
        );
        println!("Directory structure verified.");
    }

    Ok(())
}
