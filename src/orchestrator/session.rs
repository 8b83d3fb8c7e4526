//! Per-session state held by the orchestrator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compaction::ContextTracker;
use crate::context::{ActiveContext, SessionHistory};
use crate::goals::GoalManager;

pub(crate) struct Session {
    pub(crate) context: Box<dyn ActiveContext>,
    pub(crate) history: Box<dyn SessionHistory>,
    pub(crate) tracker: ContextTracker,
    pub(crate) goals: GoalManager,
    /// Every message id ever added, so ids are never reused.
    pub(crate) seen_ids: HashSet<String>,
}

/// A session behind its own lock, plus the compression-in-flight flag.
///
/// The flag is checked before waiting on the lock so a second `compress`
/// is rejected instead of queued.
pub(crate) struct SessionSlot {
    pub(crate) session: tokio::sync::Mutex<Session>,
    compressing: AtomicBool,
}

impl SessionSlot {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            compressing: AtomicBool::new(false),
        }
    }

    /// Claim the compression flag; `None` when another compression holds it.
    pub(crate) fn begin_compression(&self) -> Option<CompressionGuard<'_>> {
        if self.compressing.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(CompressionGuard {
            flag: &self.compressing,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_compressing(&self) -> bool {
        self.compressing.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag on drop, including on cancellation.
pub(crate) struct CompressionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CompressionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoalsSection;
    use crate::context::{InMemoryActiveContext, InMemorySessionHistory};
    use crate::tokens::TokenCounterService;
    use std::sync::Arc;

    fn slot() -> SessionSlot {
        let counter = Arc::new(TokenCounterService::estimating(4).unwrap());
        SessionSlot::new(Session {
            context: Box::new(InMemoryActiveContext::new(counter)),
            history: Box::new(InMemorySessionHistory::new("s")),
            tracker: ContextTracker::new(1000, 0.8),
            goals: GoalManager::new(GoalsSection::default()),
            seen_ids: HashSet::new(),
        })
    }

    #[test]
    fn test_second_claim_is_rejected_until_guard_drops() {
        let slot = slot();
        let guard = slot.begin_compression();
        assert!(guard.is_some());
        assert!(slot.is_compressing());
        assert!(slot.begin_compression().is_none());

        drop(guard);
        assert!(!slot.is_compressing());
        assert!(slot.begin_compression().is_some());
    }
}
