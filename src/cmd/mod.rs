//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled          |
//! |-----------------|---------------------------|
//! | `project`       | `Init`                    |
//! | `config`        | `Config`                  |
//! | `markers`       | `Markers`                 |
//! | `validate`      | `Validate`                |
//! | `compress`      | `Compress`                |
//! | `goals`         | `Goals`                   |
//!
//! `conversation` loads the JSON conversation files `validate` and
//! `compress` read.

pub mod compress;
pub mod config;
pub mod conversation;
pub mod goals;
pub mod markers;
pub mod project;
pub mod validate;

pub use compress::cmd_compress;
pub use config::cmd_config;
pub use goals::cmd_goals;
pub use markers::cmd_markers;
pub use project::cmd_init;
pub use validate::cmd_validate;
