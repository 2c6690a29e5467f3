//! The forward-chaining match-act loop.
//!
//! Each cycle evaluates every non-retracted rule against the fact context,
//! fires the highest-salience match (declaration order breaks ties) and
//! starts over. A session ends when no rule matches, when a rule calls
//! `Complete()`, or with `ExecutionError::MaxCycleExceeded` once the cycle
//! budget is spent. Facts modified before an error keep their new values.

/// Parallel execution over many independent inputs.
pub mod batch;
/// Hooks into the match-act loop.
pub mod listener;
/// Session identity and execution reports.
pub mod report;

pub use batch::{BatchConfig, BatchExecutor};
pub use listener::ExecutionListener;
pub use report::{ExecutionReport, SessionId};

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, RuleResult};
use crate::fact::FactContext;
use crate::knowledge::KnowledgeBaseInstance;
use crate::rule::{Effect, Evaluator, Rule};
use crate::value::Value;

/// Default number of rule firings allowed per session.
pub const DEFAULT_MAX_CYCLES: u64 = 5000;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum rule firings per session. A session that still has a
    /// matching rule after this many firings fails.
    pub max_cycles: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

/// Runs knowledge base instances against fact contexts.
///
/// The engine holds no per-session state, so one engine can serve any
/// number of threads as long as each session has its own context and
/// instance.
///
/// # Example
/// ```
/// use kyrorules::{Expr, FactContext, KnowledgeBase, Record, Rule, RuleEngine, Value};
///
/// let rule = Rule::builder("IsFirstPayout")
///     .when(Expr::field("Payout.LifetimePayoutAmount").equals(0))
///     .assign("Result.IsFirstPayoutFlagged", true)
///     .retract_self()
///     .build()
///     .unwrap();
/// let kb = KnowledgeBase::new("PayoutRules", "0.1.1", vec![rule]).unwrap();
///
/// let mut payout = Record::new().with("LifetimePayoutAmount", 0);
/// let mut result = Record::new().with("IsFirstPayoutFlagged", false);
/// let mut ctx = FactContext::new();
/// ctx.add("Payout", &mut payout).unwrap();
/// ctx.add("Result", &mut result).unwrap();
///
/// let mut instance = kb.new_instance();
/// let report = RuleEngine::default().execute(&mut ctx, &mut instance).unwrap();
/// drop(ctx);
///
/// assert_eq!(report.fired, vec!["IsFirstPayout"]);
/// assert_eq!(result.get("IsFirstPayoutFlagged"), Some(&Value::Bool(true)));
/// ```
#[derive(Clone, Default)]
pub struct RuleEngine {
    config: EngineConfig,
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl RuleEngine {
    /// Creates an engine without listeners.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
        }
    }

    /// Shorthand for an engine with a custom cycle cap.
    #[must_use]
    pub fn with_max_cycles(max_cycles: u64) -> Self {
        Self::new(EngineConfig { max_cycles })
    }

    /// Adds a listener. Listeners are called in registration order.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the match-act loop until no rule matches.
    ///
    /// Retractions from a previous run of `instance` are cleared first, so
    /// re-running an instance behaves like running a fresh one. After the
    /// call `instance` still shows which rules this session retracted.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a condition or action, or
    /// `ExecutionError::MaxCycleExceeded` if a rule is still eligible after
    /// `max_cycles` firings. Assignments made before the error are kept.
    pub fn execute(
        &self,
        ctx: &mut FactContext<'_>,
        instance: &mut KnowledgeBaseInstance,
    ) -> RuleResult<ExecutionReport> {
        instance.reset();
        let kb = instance.knowledge_base().clone();
        let session_id = SessionId::new();
        let started_at = Utc::now();
        let ev = Evaluator::new(started_at).with_regexes(kb.regexes());
        let max_cycles = self.config.max_cycles;

        tracing::debug!(
            session = %session_id,
            knowledge_base = kb.name(),
            version = kb.version(),
            facts = ctx.len(),
            "session started"
        );

        let mut cycles = 0_u64;
        let mut fired = Vec::new();
        let mut completed = false;

        loop {
            for listener in &self.listeners {
                listener.cycle_started(session_id, cycles + 1);
            }
            let Some(idx) = self.scan(session_id, ctx, instance, &ev)?.first().copied() else {
                break;
            };
            if cycles >= max_cycles {
                tracing::warn!(
                    session = %session_id,
                    knowledge_base = kb.name(),
                    max_cycles,
                    pending = %kb.rules()[idx].name,
                    "cycle limit reached"
                );
                return Err(ExecutionError::MaxCycleExceeded {
                    knowledge_base: kb.name().to_string(),
                    max_cycles,
                }
                .into());
            }
            cycles += 1;

            let rule = &kb.rules()[idx];
            for action in &rule.actions {
                let effect = action.apply(ctx, &ev).inspect_err(|e| {
                    tracing::debug!(session = %session_id, rule = %rule.name, error = %e, "action failed");
                })?;
                match effect {
                    Effect::None => {}
                    Effect::Retract(target) => {
                        if let Some(i) = kb.index_of(target) {
                            instance.retract_index(i);
                        }
                    }
                    Effect::Complete => completed = true,
                }
            }

            tracing::debug!(session = %session_id, rule = %rule.name, cycle = cycles, "rule fired");
            for listener in &self.listeners {
                listener.rule_fired(session_id, rule, cycles);
            }
            fired.push(rule.name.clone());

            if completed {
                break;
            }
        }

        let finished_at = Utc::now();
        tracing::debug!(
            session = %session_id,
            knowledge_base = kb.name(),
            cycles,
            completed,
            "session finished"
        );

        Ok(ExecutionReport {
            session_id,
            knowledge_base: kb.name().to_string(),
            version: kb.version().to_string(),
            cycles,
            fired,
            completed,
            started_at,
            finished_at,
        })
    }

    /// Names of the rules whose conditions currently hold, in firing
    /// priority order. Nothing is fired and `instance` is not reset.
    pub fn matching_rules(
        &self,
        ctx: &FactContext<'_>,
        instance: &KnowledgeBaseInstance,
    ) -> RuleResult<Vec<String>> {
        let ev = Evaluator::new(Utc::now()).with_regexes(instance.knowledge_base().regexes());
        let rules = instance.knowledge_base().rules();
        Ok(self
            .scan(SessionId::new(), ctx, instance, &ev)?
            .into_iter()
            .map(|i| rules[i].name.clone())
            .collect())
    }

    /// Evaluates every active rule and returns the matches in priority
    /// order.
    fn scan(
        &self,
        session: SessionId,
        ctx: &FactContext<'_>,
        instance: &KnowledgeBaseInstance,
        ev: &Evaluator<'_>,
    ) -> RuleResult<Vec<usize>> {
        let rules = instance.knowledge_base().rules();
        let mut matches = Vec::new();
        for idx in instance.active() {
            let rule = &rules[idx];
            let matched = condition_holds(rule, ctx, ev).inspect_err(|e| {
                tracing::debug!(session = %session, rule = %rule.name, error = %e, "condition failed");
            })?;
            for listener in &self.listeners {
                listener.rule_evaluated(session, rule, matched);
            }
            if matched {
                matches.push(idx);
            }
        }
        Ok(matches)
    }
}

fn condition_holds(rule: &Rule, ctx: &FactContext<'_>, ev: &Evaluator<'_>) -> RuleResult<bool> {
    match rule.condition.evaluate(ctx, ev)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExecutionError::NonBooleanCondition {
            rule: rule.name.clone(),
            actual: other.type_name().to_string(),
        }
        .into()),
    }
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
