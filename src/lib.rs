pub mod compaction;
pub mod config;
pub mod context;
pub mod errors;
pub mod goals;
pub mod init;
pub mod message;
pub mod orchestrator;
pub mod summarizer;
pub mod tokens;
pub mod ui;
pub mod validation;

pub use compaction::{CompressionPipeline, CompressionResult};
pub use orchestrator::ContextOrchestrator;
