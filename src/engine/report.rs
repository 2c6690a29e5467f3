//! Session identity and the summary returned by an execution.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Session this report belongs to.
    pub session_id: SessionId,
    /// Name of the knowledge base that ran.
    pub knowledge_base: String,
    /// Its version.
    pub version: String,
    /// Number of match-act cycles that fired a rule.
    pub cycles: u64,
    /// Names of fired rules, in firing order.
    pub fired: Vec<String>,
    /// True if a rule ended the session with `Complete`.
    pub completed: bool,
    /// When the session started; also what `Now()` returned.
    pub started_at: DateTime<Utc>,
    /// When the session finished.
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Wall-clock duration of the session.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Number of times `rule` fired.
    #[must_use]
    pub fn fire_count(&self, rule: &str) -> usize {
        self.fired.iter().filter(|name| *name == rule).count()
    }

    /// Returns true if `rule` fired at least once.
    #[must_use]
    pub fn has_fired(&self, rule: &str) -> bool {
        self.fired.iter().any(|name| name == rule)
    }
}
