//! # KyroRules - forward-chaining business rules
//!
//! KyroRules evaluates salience-ordered production rules against facts the
//! caller owns. Every assignment a rule makes lands directly in the caller's
//! objects, so the final state is visible once the session returns.
//!
//! ## Core Concepts
//!
//! - **Fact**: A caller-owned object exposing named fields through the [`Fact`] trait
//! - **FactContext**: A per-session mapping from fact names to borrowed facts
//! - **Rule**: A named `when`/`then` pair with a salience
//! - **KnowledgeBase**: A validated, immutable, versioned rule set
//! - **RuleEngine**: The match-act loop that fires rules until none match
//!
//! ## Usage
//!
//! ```rust
//! use kyrorules::{Expr, FactContext, KnowledgeBase, Record, Rule, RuleEngine, Value};
//!
//! let too_high = Rule::builder("IsPayoutAmountTooHigh")
//!     .description("Payout amount too high")
//!     .salience(10)
//!     .when(Expr::field("Payout.Amount").greater_than(1_000_000))
//!     .assign("Result.IsPayoutAmountTooHighFlagged", true)
//!     .retract_self()
//!     .build()?;
//! let kb = KnowledgeBase::new("PayoutRules", "0.1.1", vec![too_high])?;
//!
//! let mut payout = Record::new().with("Amount", 2_000_000);
//! let mut result = Record::new().with("IsPayoutAmountTooHighFlagged", false);
//!
//! let mut ctx = FactContext::new();
//! ctx.add("Payout", &mut payout)?;
//! ctx.add("Result", &mut result)?;
//! RuleEngine::default().execute(&mut ctx, &mut kb.new_instance())?;
//! drop(ctx);
//!
//! assert_eq!(result.get("IsPayoutAmountTooHighFlagged"), Some(&Value::Bool(true)));
//! # Ok::<(), kyrorules::RuleError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod error;
pub mod fact;
pub mod value;

// Rules and execution
pub mod engine;
pub mod knowledge;
pub mod rule;

// Re-export primary types at crate root for convenience
pub use engine::{
    BatchConfig, BatchExecutor, EngineConfig, ExecutionListener, ExecutionReport, RuleEngine,
    SessionId, DEFAULT_MAX_CYCLES,
};
pub use error::{ExecutionError, FactError, RuleError, RuleResult, ValidationError};
pub use fact::{Fact, FactContext, FactSource, FieldPath, Record};
pub use knowledge::{KnowledgeBase, KnowledgeBaseDefinition, KnowledgeBaseInstance, KnowledgeLibrary};
pub use rule::{Action, BinaryOp, Evaluator, Expr, Function, Rule, RuleBuilder, UnaryOp};
pub use value::Value;
