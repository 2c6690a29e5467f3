//! Parallel execution over many independent inputs.
//!
//! Each input gets its own fact context and knowledge base instance, so the
//! only thing workers share is the immutable knowledge base.

use std::num::NonZeroUsize;
use std::thread;

use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};

use crate::error::{RuleError, RuleResult};
use crate::fact::{FactContext, FactSource};
use crate::knowledge::KnowledgeBase;

use super::{ExecutionReport, RuleEngine};

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of worker threads. Never more than the number of inputs.
    pub workers: usize,
    /// Maximum queued inputs.
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(4, NonZeroUsize::get),
            queue_capacity: 1024,
        }
    }
}

/// Runs one knowledge base against many inputs on a scoped worker pool.
///
/// # Example
/// ```
/// use kyrorules::{
///     BatchConfig, BatchExecutor, Expr, FactContext, FactSource, KnowledgeBase, Record, Rule,
///     RuleEngine, RuleResult, Value,
/// };
///
/// struct Input {
///     payout: Record,
/// }
///
/// impl FactSource for Input {
///     fn register<'a>(&'a mut self, ctx: &mut FactContext<'a>) -> RuleResult<()> {
///         ctx.add("Payout", &mut self.payout)?;
///         Ok(())
///     }
/// }
///
/// let rule = Rule::builder("Flag")
///     .when(Expr::field("Payout.Amount").greater_than(100))
///     .assign("Payout.Flagged", true)
///     .retract_self()
///     .build()
///     .unwrap();
/// let kb = KnowledgeBase::new("kb", "1", vec![rule]).unwrap();
///
/// let mut inputs: Vec<Input> = [50, 500]
///     .into_iter()
///     .map(|amount| Input {
///         payout: Record::new().with("Amount", amount).with("Flagged", false),
///     })
///     .collect();
///
/// let batch = BatchExecutor::new(RuleEngine::default(), BatchConfig::default());
/// let results = batch.execute_all(&kb, &mut inputs).unwrap();
/// assert!(results.iter().all(Result::is_ok));
/// assert_eq!(inputs[0].payout.get("Flagged"), Some(&Value::Bool(false)));
/// assert_eq!(inputs[1].payout.get("Flagged"), Some(&Value::Bool(true)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    engine: RuleEngine,
    config: BatchConfig,
}

impl BatchExecutor {
    /// Creates an executor that runs sessions with `engine`.
    #[must_use]
    pub fn new(engine: RuleEngine, config: BatchConfig) -> Self {
        Self { engine, config }
    }

    /// The engine each worker uses.
    #[must_use]
    pub const fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Executes `kb` once per item, in parallel.
    ///
    /// The outer `Result` fails only if the pool cannot be started; per-item
    /// outcomes come back in input order. A failing item does not affect the
    /// others.
    pub fn execute_all<T: FactSource + Send>(
        &self,
        kb: &KnowledgeBase,
        items: &mut [T],
    ) -> RuleResult<Vec<RuleResult<ExecutionReport>>> {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.config.workers.max(1).min(total);
        let queue_capacity = self.config.queue_capacity.max(1);

        tracing::debug!(
            knowledge_base = kb.name(),
            items = total,
            workers,
            "batch started"
        );

        let results = thread::scope(|scope| -> RuleResult<Vec<RuleResult<ExecutionReport>>> {
            let (job_tx, job_rx) = bounded::<(usize, &mut T)>(queue_capacity);
            // Sized so workers never block on results while jobs are queued.
            let (result_tx, result_rx) = bounded::<(usize, RuleResult<ExecutionReport>)>(total);

            for idx in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("kyrorules-batch-{idx}"))
                    .spawn_scoped(scope, move || {
                        for (i, item) in job_rx {
                            let outcome = self.run_one(kb, item);
                            if result_tx.send((i, outcome)).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| RuleError::internal(format!("failed to spawn batch worker: {e}")))?;
            }
            drop(job_rx);
            drop(result_tx);

            for job in items.iter_mut().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            // Close the queue: workers drain it and exit.
            drop(job_tx);

            let mut slots: Vec<Option<RuleResult<ExecutionReport>>> =
                std::iter::repeat_with(|| None).take(total).collect();
            for (i, outcome) in result_rx {
                slots[i] = Some(outcome);
            }
            Ok(slots
                .into_iter()
                .enumerate()
                .map(|(i, slot)| {
                    slot.unwrap_or_else(|| {
                        Err(RuleError::internal(format!("batch item {i} produced no result")))
                    })
                })
                .collect())
        })?;

        tracing::debug!(
            knowledge_base = kb.name(),
            items = total,
            failed = results.iter().filter(|r| r.is_err()).count(),
            "batch finished"
        );
        Ok(results)
    }

    fn run_one<T: FactSource>(&self, kb: &KnowledgeBase, item: &mut T) -> RuleResult<ExecutionReport> {
        let mut ctx = FactContext::new();
        item.register(&mut ctx)?;
        let mut instance = kb.new_instance();
        self.engine.execute(&mut ctx, &mut instance)
    }
}
