//! Built-in functions callable from rule expressions.

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, RuleError, RuleResult, ValidationError};
use crate::value::Value;

use super::expr::{compare, loose_eq, Evaluator, Expr};

/// Built-in functions.
///
/// | Function     | Arguments            | Result                              |
/// |--------------|----------------------|-------------------------------------|
/// | `Len`        | string or list       | int                                 |
/// | `Contains`   | string, string       | bool (substring)                    |
/// |              | list, any            | bool (membership)                   |
/// | `StartsWith` | string, string       | bool                                |
/// | `EndsWith`   | string, string       | bool                                |
/// | `ToUpper`    | string               | string                              |
/// | `ToLower`    | string               | string                              |
/// | `Matches`    | string, regex string | bool                                |
/// | `Abs`        | number               | number                              |
/// | `Min`, `Max` | one or more numbers  | number (int if every argument is)   |
/// | `IsZero`     | any                  | bool (0, "", empty list or null)    |
/// | `Now`        | none                 | time the session started            |
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Len,
    Contains,
    StartsWith,
    EndsWith,
    ToUpper,
    ToLower,
    Matches,
    Abs,
    Min,
    Max,
    IsZero,
    Now,
}

impl Function {
    /// Function name as it appears in rendered expressions.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "Len",
            Self::Contains => "Contains",
            Self::StartsWith => "StartsWith",
            Self::EndsWith => "EndsWith",
            Self::ToUpper => "ToUpper",
            Self::ToLower => "ToLower",
            Self::Matches => "Matches",
            Self::Abs => "Abs",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::IsZero => "IsZero",
            Self::Now => "Now",
        }
    }

    /// Accepted argument count as `(min, max)`; `None` means unbounded.
    #[must_use]
    pub const fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Now => (0, Some(0)),
            Self::Len | Self::ToUpper | Self::ToLower | Self::Abs | Self::IsZero => (1, Some(1)),
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::Matches => (2, Some(2)),
            Self::Min | Self::Max => (1, None),
        }
    }

    /// Checks the argument count and, for `Matches`, a literal pattern.
    pub fn validate_call(self, args: &[Expr]) -> Result<(), ValidationError> {
        let (min, max) = self.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ValidationError::InvalidDefinition {
                reason: format!(
                    "{}() takes {} argument(s), got {}",
                    self.name(),
                    match max {
                        Some(max) if max == min => min.to_string(),
                        Some(max) => format!("{min} to {max}"),
                        None => format!("at least {min}"),
                    },
                    args.len()
                ),
            });
        }
        if let (Self::Matches, Some(Expr::Literal { value: Value::String(pattern) })) =
            (self, args.get(1))
        {
            regex::Regex::new(pattern).map_err(|e| ValidationError::InvalidRegex {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn invalid(self, reason: impl Into<String>) -> RuleError {
        ExecutionError::InvalidArguments {
            function: self.name().to_string(),
            reason: reason.into(),
        }
        .into()
    }

    fn expect_str<'v>(self, value: &'v Value) -> RuleResult<&'v str> {
        value
            .as_string()
            .ok_or_else(|| self.invalid(format!("expected string, got {}", value.type_name())))
    }

    /// Calls the function with evaluated arguments.
    pub fn call(self, args: Vec<Value>, ev: &Evaluator<'_>) -> RuleResult<Value> {
        let (min, max) = self.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(self.invalid(format!("unexpected argument count {}", args.len())));
        }

        match self {
            Self::Now => Ok(Value::Time(ev.now())),
            Self::Len => match &args[0] {
                Value::String(s) => Ok(Value::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))),
                Value::List(items) => Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX))),
                other => Err(self.invalid(format!("cannot take length of {}", other.type_name()))),
            },
            Self::Contains => match (&args[0], &args[1]) {
                (Value::String(haystack), needle) => {
                    Ok(Value::Bool(haystack.contains(self.expect_str(needle)?)))
                }
                (Value::List(items), needle) => {
                    Ok(Value::Bool(items.iter().any(|item| loose_eq(item, needle))))
                }
                (other, _) => Err(self.invalid(format!("cannot search {}", other.type_name()))),
            },
            Self::StartsWith => {
                let s = self.expect_str(&args[0])?;
                Ok(Value::Bool(s.starts_with(self.expect_str(&args[1])?)))
            }
            Self::EndsWith => {
                let s = self.expect_str(&args[0])?;
                Ok(Value::Bool(s.ends_with(self.expect_str(&args[1])?)))
            }
            Self::ToUpper => Ok(Value::String(self.expect_str(&args[0])?.to_uppercase())),
            Self::ToLower => Ok(Value::String(self.expect_str(&args[0])?.to_lowercase())),
            Self::Matches => {
                let text = self.expect_str(&args[0])?;
                let pattern = self.expect_str(&args[1])?;
                Ok(Value::Bool(ev.is_match(pattern, text)?))
            }
            Self::Abs => match &args[0] {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| ExecutionError::Overflow { op: "Abs".to_string() }.into()),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(self.invalid(format!("expected number, got {}", other.type_name()))),
            },
            Self::Min | Self::Max => {
                let mut iter = args.into_iter();
                let mut best = iter.next().unwrap_or(Value::Null);
                if !best.is_number() {
                    return Err(self.invalid(format!("expected number, got {}", best.type_name())));
                }
                let mut all_int = best.is_int();
                for candidate in iter {
                    let ord = compare(&candidate, &best).ok_or_else(|| {
                        self.invalid(format!("expected number, got {}", candidate.type_name()))
                    })?;
                    all_int &= candidate.is_int();
                    let better = if self == Self::Min {
                        ord.is_lt()
                    } else {
                        ord.is_gt()
                    };
                    if better {
                        best = candidate;
                    }
                }
                if all_int {
                    Ok(best)
                } else {
                    Ok(best.as_float().map_or(Value::Null, Value::Float))
                }
            }
            Self::IsZero => Ok(Value::Bool(match &args[0] {
                Value::Int(i) => *i == 0,
                Value::Float(f) => *f == 0.0,
                Value::String(s) => s.is_empty(),
                Value::List(items) => items.is_empty(),
                Value::Null => true,
                Value::Bool(_) | Value::Time(_) => false,
            })),
        }
    }
}
