//! Error types for KyroRules.
//!
//! All errors in KyroRules are strongly typed using thiserror.
//! Construction problems surface as [`ValidationError`], field resolution
//! problems as [`FactError`] and match-act loop failures as
//! [`ExecutionError`]. Every error aborts the current execution; facts
//! already mutated by fired rules stay mutated.

use thiserror::Error;

/// Validation errors raised while building facts, rules or knowledge bases.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Duplicate rule name '{name}' in knowledge base '{knowledge_base}'")]
    DuplicateRuleName {
        knowledge_base: String,
        name: String,
    },

    #[error("Fact '{name}' is already registered in this context")]
    DuplicateFactName {
        name: String,
    },

    #[error("Knowledge base '{name}' version '{version}' is already registered")]
    DuplicateKnowledgeBase {
        name: String,
        version: String,
    },

    #[error("Rule '{rule}' retracts unknown rule '{target}'")]
    UnknownRetractTarget {
        rule: String,
        target: String,
    },

    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath {
        path: String,
        reason: String,
    },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        pattern: String,
        reason: String,
    },

    #[error("Invalid rule definition: {reason}")]
    InvalidDefinition {
        reason: String,
    },
}

/// Errors raised while resolving or writing fact fields.
#[derive(Debug, Error, PartialEq)]
pub enum FactError {
    #[error("Field not found: {path}")]
    FieldNotFound {
        path: String,
    },

    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Field '{path}' is read-only")]
    ReadOnly {
        path: String,
    },
}

impl FactError {
    /// Creates a field-not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FieldNotFound { path: path.into() }
    }

    /// Creates a type-mismatch error.
    #[must_use]
    pub fn mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns a copy of this error with `prefix.` prepended to its path.
    ///
    /// Facts report paths relative to themselves; the context uses this to
    /// report the full dotted path the rule referenced.
    #[must_use]
    pub fn within(self, prefix: &str) -> Self {
        let join = |path: String| {
            if path.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{path}")
            }
        };
        match self {
            Self::FieldNotFound { path } => Self::FieldNotFound { path: join(path) },
            Self::TypeMismatch {
                path,
                expected,
                actual,
            } => Self::TypeMismatch {
                path: join(path),
                expected,
                actual,
            },
            Self::ReadOnly { path } => Self::ReadOnly { path: join(path) },
        }
    }
}

/// Errors raised by the match-act loop.
#[derive(Debug, Error, PartialEq)]
pub enum ExecutionError {
    #[error("Knowledge base '{knowledge_base}' exceeded the maximum of {max_cycles} cycles")]
    MaxCycleExceeded {
        knowledge_base: String,
        max_cycles: u64,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow in '{op}'")]
    Overflow {
        op: String,
    },

    #[error("Operator '{op}' cannot be applied to {lhs} and {rhs}")]
    InvalidOperands {
        op: String,
        lhs: String,
        rhs: String,
    },

    #[error("Invalid arguments to {function}: {reason}")]
    InvalidArguments {
        function: String,
        reason: String,
    },

    #[error("Condition of rule '{rule}' evaluated to {actual}, expected bool")]
    NonBooleanCondition {
        rule: String,
        actual: String,
    },

    #[error("Knowledge base '{name}' version '{version}' not found")]
    KnowledgeBaseNotFound {
        name: String,
        version: String,
    },
}

/// Top-level error type for KyroRules.
#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fact error: {0}")]
    Fact(#[from] FactError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RuleError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a fact resolution error.
    #[must_use]
    pub const fn is_fact(&self) -> bool {
        matches!(self, Self::Fact(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the session stopped because it hit the cycle cap.
    #[must_use]
    pub const fn is_max_cycle_exceeded(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::MaxCycleExceeded { .. })
        )
    }

    /// Returns true if a referenced fact or field does not exist.
    #[must_use]
    pub const fn is_field_not_found(&self) -> bool {
        matches!(self, Self::Fact(FactError::FieldNotFound { .. }))
    }
}

/// Result type alias for KyroRules operations.
pub type RuleResult<T> = Result<T, RuleError>;
