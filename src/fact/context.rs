//! The fact context a session evaluates rules against.

use std::collections::HashMap;
use std::fmt;

use crate::error::{FactError, RuleResult, ValidationError};
use crate::value::Value;

use super::path::FieldPath;
use super::Fact;

/// Mapping from fact names to mutable borrows of caller-owned facts.
///
/// The context holds references, not copies: every assignment a rule makes
/// lands directly in the caller's objects. The borrow lifetime `'a` ties the
/// context to one unit of work; once it is dropped the caller reads the
/// final fact state.
///
/// # Example
/// ```
/// use kyrorules::{FactContext, FieldPath, Record, Value};
///
/// let mut result = Record::new().with("Flagged", false);
/// {
///     let mut ctx = FactContext::new();
///     ctx.add("Result", &mut result).unwrap();
///     ctx.set(&FieldPath::new("Result.Flagged"), Value::Bool(true)).unwrap();
/// }
/// assert_eq!(result.get("Flagged"), Some(&Value::Bool(true)));
/// ```
#[derive(Default)]
pub struct FactContext<'a> {
    facts: HashMap<String, &'a mut dyn Fact>,
}

impl<'a> FactContext<'a> {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fact` under `name`, ignoring surrounding whitespace.
    ///
    /// Returns `ValidationError::DuplicateFactName` if the name is taken and
    /// `ValidationError::MissingField` if it is empty.
    pub fn add<F: Fact + 'a>(
        &mut self,
        name: impl Into<String>,
        fact: &'a mut F,
    ) -> Result<(), ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField {
                field: "fact name".to_string(),
            });
        }
        if self.facts.contains_key(&name) {
            return Err(ValidationError::DuplicateFactName { name });
        }
        self.facts.insert(name, fact);
        Ok(())
    }

    /// Unregisters a fact, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.facts.remove(name.trim()).is_some()
    }

    /// Returns true if a fact is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name.trim())
    }

    /// Registered fact names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.facts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if no fact is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Resolves `path` to the current value of its terminal field.
    pub fn get(&self, path: &FieldPath) -> Result<Value, FactError> {
        let Some(root) = self.facts.get(path.root()) else {
            return Err(FactError::not_found(path.as_str()));
        };

        let mut current: &dyn Fact = &**root;
        for segment in path.intermediate() {
            current = current
                .nested(segment)
                .ok_or_else(|| FactError::not_found(path.as_str()))?;
        }

        current
            .field(path.field())
            .map_err(|e| e.within(&path.parent()))
    }

    /// Writes `value` to the terminal field of `path`.
    pub fn set(&mut self, path: &FieldPath, value: Value) -> Result<(), FactError> {
        let Some(root) = self.facts.get_mut(path.root()) else {
            return Err(FactError::not_found(path.as_str()));
        };

        let mut current: &mut dyn Fact = &mut **root;
        for segment in path.intermediate() {
            current = match current.nested_mut(segment) {
                Some(next) => next,
                None => return Err(FactError::not_found(path.as_str())),
            };
        }

        current
            .set_field(path.field(), value)
            .map_err(|e| e.within(&path.parent()))
    }
}

impl fmt::Debug for FactContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactContext")
            .field("facts", &self.names())
            .finish()
    }
}

/// A unit of work that knows how to register its own facts.
///
/// Implemented by caller input types so the
/// [`BatchExecutor`](crate::engine::BatchExecutor) can build a fresh context
/// per item.
///
/// # Example
/// ```
/// use kyrorules::{FactContext, FactSource, Record, RuleResult};
///
/// struct PayoutInput {
///     payout: Record,
///     result: Record,
/// }
///
/// impl FactSource for PayoutInput {
///     fn register<'a>(&'a mut self, ctx: &mut FactContext<'a>) -> RuleResult<()> {
///         ctx.add("Payout", &mut self.payout)?;
///         ctx.add("Result", &mut self.result)?;
///         Ok(())
///     }
/// }
/// ```
pub trait FactSource {
    /// Adds this item's facts to `ctx`.
    fn register<'a>(&'a mut self, ctx: &mut FactContext<'a>) -> RuleResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Record;

    fn payout() -> Record {
        Record::new()
            .with("Amount", 999_999)
            .with_record("PaymentMethod", Record::new().with("Name", "jo"))
    }

    #[test]
    fn test_add_duplicate_name() {
        let mut a = Record::new();
        let mut b = Record::new();
        let mut ctx = FactContext::new();
        ctx.add("Payout", &mut a).unwrap();
        let err = ctx.add("Payout", &mut b).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateFactName { name } if name == "Payout"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_add_empty_name() {
        let mut a = Record::new();
        let mut ctx = FactContext::new();
        assert!(ctx.add("  ", &mut a).is_err());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_get_nested_path() {
        let mut p = payout();
        let mut ctx = FactContext::new();
        ctx.add("Payout", &mut p).unwrap();

        let name = ctx.get(&FieldPath::new("Payout.PaymentMethod.Name")).unwrap();
        assert_eq!(name, Value::from("jo"));
        let amount = ctx.get(&FieldPath::new("Payout.Amount")).unwrap();
        assert_eq!(amount, Value::Int(999_999));
    }

    #[test]
    fn test_get_unknown_fact() {
        let ctx = FactContext::new();
        let err = ctx.get(&FieldPath::new("Missing.Amount")).unwrap_err();
        assert_eq!(err, FactError::not_found("Missing.Amount"));
    }

    #[test]
    fn test_get_unknown_segments() {
        let mut p = payout();
        let mut ctx = FactContext::new();
        ctx.add("Payout", &mut p).unwrap();

        let err = ctx.get(&FieldPath::new("Payout.Bank.Name")).unwrap_err();
        assert_eq!(err, FactError::not_found("Payout.Bank.Name"));
        let err = ctx.get(&FieldPath::new("Payout.PaymentMethod.Iban")).unwrap_err();
        assert_eq!(err, FactError::not_found("Payout.PaymentMethod.Iban"));
    }

    #[test]
    fn test_set_writes_through_to_caller() {
        let mut p = payout();
        {
            let mut ctx = FactContext::new();
            ctx.add("Payout", &mut p).unwrap();
            ctx.set(&FieldPath::new("Payout.PaymentMethod.Name"), Value::from("joe"))
                .unwrap();
            assert!(ctx.contains("Payout"));
        }
        let pm = p.record("PaymentMethod").unwrap();
        assert_eq!(pm.get("Name"), Some(&Value::from("joe")));
    }

    #[test]
    fn test_set_type_mismatch_reports_full_path() {
        let mut p = payout();
        let mut ctx = FactContext::new();
        ctx.add("Payout", &mut p).unwrap();

        let err = ctx
            .set(&FieldPath::new("Payout.Amount"), Value::from("lots"))
            .unwrap_err();
        assert_eq!(err, FactError::mismatch("Payout.Amount", "int", "string"));
    }

    #[test]
    fn test_set_read_only() {
        let mut account = Record::new().with_read_only("Name", "jo");
        let mut ctx = FactContext::new();
        ctx.add("Account", &mut account).unwrap();

        let err = ctx
            .set(&FieldPath::new("Account.Name"), Value::from("joe"))
            .unwrap_err();
        assert_eq!(
            err,
            FactError::ReadOnly {
                path: "Account.Name".to_string()
            }
        );
    }

    #[test]
    fn test_padded_names_resolve_consistently() {
        let mut p = payout();
        let mut other = Record::new();
        let mut ctx = FactContext::new();
        ctx.add(" Payout ", &mut p).unwrap();
        assert!(ctx.contains(" Payout "));
        assert!(ctx.contains("Payout"));
        assert_eq!(ctx.names(), vec!["Payout"]);
        assert!(ctx.add("Payout", &mut other).is_err());
        assert!(ctx.remove(" Payout "));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_remove_and_names() {
        let mut a = Record::new();
        let mut b = Record::new();
        let mut ctx = FactContext::new();
        ctx.add("Result", &mut a).unwrap();
        ctx.add("Account", &mut b).unwrap();
        assert_eq!(ctx.names(), vec!["Account", "Result"]);
        assert!(ctx.remove("Result"));
        assert!(!ctx.remove("Result"));
        assert_eq!(ctx.names(), vec!["Account"]);
    }
}
