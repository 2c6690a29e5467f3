//! A dynamic, map-backed fact.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FactError;
use crate::value::Value;

use super::{check_assignable, Fact};

/// One field of a [`Record`]: a value or a nested record.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    Record(Record),
    Value(Value),
}

/// A fact whose fields are declared at runtime.
///
/// A field's declared type is the type of the value it was created with;
/// later assignments must match it (ints widen into float fields, a null
/// field accepts anything). Fields added with [`Record::with_read_only`]
/// reject assignment.
///
/// # Example
/// ```
/// use kyrorules::{Fact, Record, Value};
///
/// let payout = Record::new()
///     .with("Amount", 1_000_001)
///     .with_record("PaymentMethod", Record::new().with("Name", "jo"));
///
/// assert_eq!(payout.field("Amount").unwrap(), Value::Int(1_000_001));
/// assert!(payout.nested("PaymentMethod").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Slot>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    read_only: BTreeSet<String>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a writable scalar field.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds (or replaces) a read-only scalar field.
    #[must_use]
    pub fn with_read_only(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.read_only.insert(name.clone());
        self.fields.insert(name, Slot::Value(value.into()));
        self
    }

    /// Adds (or replaces) a nested record.
    #[must_use]
    pub fn with_record(mut self, name: impl Into<String>, record: Record) -> Self {
        let name = name.into();
        self.read_only.remove(&name);
        self.fields.insert(name, Slot::Record(record));
        self
    }

    /// Inserts a writable scalar field without any type check, replacing any
    /// previous field of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.read_only.remove(&name);
        self.fields.insert(name, Slot::Value(value.into()));
    }

    /// Returns a scalar field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Returns a nested record.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&Record> {
        match self.fields.get(name) {
            Some(Slot::Record(r)) => Some(r),
            _ => None,
        }
    }

    /// Returns true if `name` was declared read-only.
    #[must_use]
    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only.contains(name)
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields, nested records included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Fact for Record {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        match self.fields.get(name) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(Slot::Record(_)) => Err(FactError::mismatch(name, "value", "record")),
            None => Err(FactError::not_found(name)),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FactError> {
        if self.read_only.contains(name) {
            return Err(FactError::ReadOnly {
                path: name.to_string(),
            });
        }
        match self.fields.get_mut(name) {
            Some(Slot::Value(current)) => {
                *current = check_assignable(name, current, value)?;
                Ok(())
            }
            Some(Slot::Record(_)) => Err(FactError::mismatch(name, "record", value.type_name())),
            None => Err(FactError::not_found(name)),
        }
    }

    fn nested(&self, name: &str) -> Option<&dyn Fact> {
        match self.fields.get(name) {
            Some(Slot::Record(r)) => Some(r as &dyn Fact),
            _ => None,
        }
    }

    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn Fact> {
        match self.fields.get_mut(name) {
            Some(Slot::Record(r)) => Some(r as &mut dyn Fact),
            _ => None,
        }
    }
}
