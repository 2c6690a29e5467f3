//! Hooks into the match-act loop.

use crate::rule::Rule;

use super::report::SessionId;

/// Observer notified as a session scans and fires rules.
///
/// All methods default to no-ops. Listeners run synchronously on the
/// session's thread and must not block.
pub trait ExecutionListener: Send + Sync {
    /// A new scan is about to start. `cycle` counts from 1.
    fn cycle_started(&self, session: SessionId, cycle: u64) {
        let _ = (session, cycle);
    }

    /// A rule's condition was evaluated.
    fn rule_evaluated(&self, session: SessionId, rule: &Rule, matched: bool) {
        let _ = (session, rule, matched);
    }

    /// A rule's actions ran to completion.
    fn rule_fired(&self, session: SessionId, rule: &Rule, cycle: u64) {
        let _ = (session, rule, cycle);
    }
}
