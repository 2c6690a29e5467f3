//! Rules: named, salience-ordered condition/action pairs.
//!
//! Rules arrive as pre-parsed structured objects, either built in Rust with
//! [`RuleBuilder`] or deserialized from the JSON an external rule-language
//! front end produces.

/// Rule actions.
pub mod action;
/// Rule expressions and their evaluation.
pub mod expr;
/// Built-in functions.
pub mod function;

pub use action::{Action, Effect};
pub use expr::{BinaryOp, Evaluator, Expr, UnaryOp};
pub use function::Function;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A production rule.
///
/// Among rules whose conditions hold, the one with the highest `salience`
/// fires first; equal salience falls back to declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique name within a knowledge base; the target of `Retract`.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Priority; higher fires first.
    #[serde(default)]
    pub salience: i64,
    /// The `when` part.
    pub condition: Expr,
    /// The `then` part, run in order.
    pub actions: Vec<Action>,
}

impl Rule {
    /// Starts building a rule named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name)
    }

    /// Checks the rule in isolation.
    ///
    /// Retraction targets are checked by the knowledge base, which knows the
    /// other rule names. The name and retraction targets must not carry
    /// surrounding whitespace, since they are matched exactly.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "name".to_string(),
            });
        }
        if self.name.trim() != self.name {
            return Err(ValidationError::InvalidDefinition {
                reason: format!("rule name '{}' has surrounding whitespace", self.name),
            });
        }
        if self.actions.is_empty() {
            return Err(ValidationError::MissingField {
                field: format!("actions of rule '{}'", self.name),
            });
        }
        self.condition.validate()?;
        for action in &self.actions {
            match action {
                Action::Assign { path, value } => {
                    path.validate()?;
                    value.validate()?;
                }
                Action::Evaluate { expr } => expr.validate()?,
                Action::Retract { rule } if rule.trim().is_empty() => {
                    return Err(ValidationError::MissingField {
                        field: format!("retract target of rule '{}'", self.name),
                    });
                }
                Action::Retract { rule } if rule.trim() != rule => {
                    return Err(ValidationError::InvalidDefinition {
                        reason: format!(
                            "rule '{}' retracts '{rule}', which has surrounding whitespace",
                            self.name
                        ),
                    });
                }
                Action::Retract { .. } | Action::Complete => {}
            }
        }
        Ok(())
    }

    /// Names of rules this rule retracts, without duplicates.
    #[must_use]
    pub fn retract_targets(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::Retract { rule } => Some(rule.as_str()),
                _ => None,
            })
            .filter(|rule| seen.insert(*rule))
            .collect()
    }

    /// Every expression in the rule, condition first.
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> {
        std::iter::once(&self.condition).chain(self.actions.iter().filter_map(|action| {
            match action {
                Action::Assign { value, .. } => Some(value),
                Action::Evaluate { expr } => Some(expr),
                Action::Retract { .. } | Action::Complete => None,
            }
        }))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}", self.name)?;
        if !self.description.is_empty() {
            write!(f, " {:?}", self.description)?;
        }
        if self.salience != 0 {
            write!(f, " salience {}", self.salience)?;
        }
        writeln!(f, " {{")?;
        writeln!(f, "when")?;
        writeln!(f, "    {}", self.condition)?;
        writeln!(f, "then")?;
        for action in &self.actions {
            writeln!(f, "    {action}")?;
        }
        write!(f, "}}")
    }
}

/// Builder for [`Rule`].
///
/// # Example
/// ```
/// use kyrorules::{Expr, Rule};
///
/// let rule = Rule::builder("IsFirstPayout")
///     .description("First Payout")
///     .salience(1)
///     .when(Expr::field("Payout.LifetimePayoutAmount").equals(0))
///     .assign("Result.IsFirstPayoutFlagged", true)
///     .retract("IsFirstPayout")
///     .build()
///     .unwrap();
///
/// assert_eq!(rule.salience, 1);
/// assert_eq!(rule.actions.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    name: String,
    description: String,
    salience: i64,
    condition: Option<Expr>,
    actions: Vec<Action>,
}

impl RuleBuilder {
    /// Creates a builder with salience 0 and no actions. Surrounding
    /// whitespace is stripped from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            description: String::new(),
            salience: 0,
            condition: None,
            actions: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the salience.
    #[must_use]
    pub fn salience(mut self, salience: i64) -> Self {
        self.salience = salience;
        self
    }

    /// Set the condition (required).
    #[must_use]
    pub fn when(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Append an action.
    #[must_use]
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append `path = value`.
    #[must_use]
    pub fn assign(self, path: &str, value: impl Into<Expr>) -> Self {
        self.then(Action::assign(path, value))
    }

    /// Append `Retract(rule)`.
    #[must_use]
    pub fn retract(self, rule: impl Into<String>) -> Self {
        self.then(Action::retract(rule))
    }

    /// Append a retraction of the rule being built.
    #[must_use]
    pub fn retract_self(self) -> Self {
        let name = self.name.clone();
        self.retract(name)
    }

    /// Append `Complete()`.
    #[must_use]
    pub fn complete(self) -> Self {
        self.then(Action::Complete)
    }

    /// Build the rule.
    ///
    /// Returns `ValidationError::MissingField` if the name, condition or
    /// actions are missing, and path/function errors from
    /// [`Rule::validate`].
    pub fn build(self) -> Result<Rule, ValidationError> {
        let condition = self.condition.ok_or_else(|| ValidationError::MissingField {
            field: "condition".to_string(),
        })?;
        let rule = Rule {
            name: self.name,
            description: self.description,
            salience: self.salience,
            condition,
            actions: self.actions,
        };
        rule.validate()?;
        Ok(rule)
    }
}
