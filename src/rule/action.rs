//! Rule actions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RuleResult;
use crate::fact::{FactContext, FieldPath};

use super::expr::{Evaluator, Expr};

/// One statement in a rule's `then` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Evaluate `value` and write it to the field at `path`.
    Assign {
        /// Target field.
        path: FieldPath,
        /// New value.
        value: Expr,
    },
    /// Exclude the named rule from the rest of the session.
    Retract {
        /// Rule to retract; may be the firing rule itself.
        rule: String,
    },
    /// Evaluate an expression and discard the result.
    ///
    /// A bare field read is legal here and has no effect.
    Evaluate {
        /// Expression to evaluate.
        expr: Expr,
    },
    /// Stop the session after this rule's actions finish.
    Complete,
}

/// What the engine must do after an action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect<'r> {
    /// Nothing beyond the fact mutation already applied.
    None,
    /// Retract the named rule.
    Retract(&'r str),
    /// End the session.
    Complete,
}

impl Action {
    /// `path = value`.
    #[must_use]
    pub fn assign(path: impl Into<FieldPath>, value: impl Into<Expr>) -> Self {
        Self::Assign {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `Retract("rule")`. Surrounding whitespace is stripped from `rule`.
    #[must_use]
    pub fn retract(rule: impl Into<String>) -> Self {
        Self::Retract {
            rule: rule.into().trim().to_string(),
        }
    }

    /// A bare expression statement.
    #[must_use]
    pub fn evaluate(expr: Expr) -> Self {
        Self::Evaluate { expr }
    }

    /// Runs the action against `ctx`.
    ///
    /// Assignments are applied immediately; retraction and completion are
    /// reported back so the engine can update session state.
    pub fn apply<'r>(&'r self, ctx: &mut FactContext<'_>, ev: &Evaluator<'_>) -> RuleResult<Effect<'r>> {
        match self {
            Self::Assign { path, value } => {
                let value = value.evaluate(ctx, ev)?;
                ctx.set(path, value)?;
                Ok(Effect::None)
            }
            Self::Retract { rule } => Ok(Effect::Retract(rule)),
            Self::Evaluate { expr } => {
                expr.evaluate(ctx, ev)?;
                Ok(Effect::None)
            }
            Self::Complete => Ok(Effect::Complete),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign { path, value } => write!(f, "{path} = {value};"),
            Self::Retract { rule } => write!(f, "Retract({rule:?});"),
            Self::Evaluate { expr } => write!(f, "{expr};"),
            Self::Complete => f.write_str("Complete();"),
        }
    }
}
