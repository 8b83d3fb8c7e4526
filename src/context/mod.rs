//! Conversation storage: the live active context and the session ledger.

mod active;
mod history;

pub use active::{ActiveContext, ActiveContextState, InMemoryActiveContext, TokenBreakdown};
pub use history::{InMemorySessionHistory, SessionHistory, SessionHistoryState};
