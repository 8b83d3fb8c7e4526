//! Shared UI icons.
//!
//! Each icon falls back to a plain-text marker on terminals without emoji.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Goal markers
pub static CHECKPOINT: Emoji<'_, '_> = Emoji("📍 ", "[CP]");
pub static DECISION: Emoji<'_, '_> = Emoji("⚖️  ", "[DEC]");
pub static ARTIFACT: Emoji<'_, '_> = Emoji("📄 ", "[ART]");

// Progress indicators
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static GOAL: Emoji<'_, '_> = Emoji("🎯 ", "[GOAL]");
