//! Facts and the per-session fact context.
//!
//! A fact is a caller-owned record exposed to rules under a name. Rules
//! reach into facts through dotted [`FieldPath`]s; the [`Fact`] trait is the
//! capability a type implements to make its fields addressable that way.

/// Per-session mapping from fact names to borrowed facts.
pub mod context;
/// `Fact` implementation for JSON objects.
pub mod json;
/// Dotted field paths.
pub mod path;
/// A dynamic, map-backed fact.
pub mod record;

pub use context::{FactContext, FactSource};
pub use path::FieldPath;
pub use record::Record;

use crate::error::FactError;
use crate::value::Value;

/// Named-field access to a caller-owned record.
///
/// Implementations report errors with paths relative to themselves (usually
/// just the field name); the [`FactContext`] prefixes the rest of the path.
///
/// # Example
/// ```
/// use kyrorules::{Fact, FactError, Value};
///
/// struct Account {
///     name: String,
///     verified: bool,
/// }
///
/// impl Fact for Account {
///     fn field(&self, name: &str) -> Result<Value, FactError> {
///         match name {
///             "Name" => Ok(Value::from(self.name.as_str())),
///             "Verified" => Ok(Value::Bool(self.verified)),
///             _ => Err(FactError::not_found(name)),
///         }
///     }
/// }
///
/// let account = Account { name: "jo".into(), verified: false };
/// assert_eq!(account.field("Name").unwrap(), Value::from("jo"));
/// ```
pub trait Fact {
    /// Reads a scalar field.
    fn field(&self, name: &str) -> Result<Value, FactError>;

    /// Writes a scalar field.
    ///
    /// The default implementation makes every field read-only.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FactError> {
        let _ = value;
        Err(FactError::ReadOnly {
            path: name.to_string(),
        })
    }

    /// Returns a nested record, if `name` is one.
    fn nested(&self, name: &str) -> Option<&dyn Fact> {
        let _ = name;
        None
    }

    /// Returns a nested record for writing, if `name` is one.
    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn Fact> {
        let _ = name;
        None
    }
}

/// Checks `incoming` against the current value of a field and converts it to
/// the field's representation.
///
/// Helper for [`Fact::set_field`] implementations over dynamic storage.
pub fn check_assignable(name: &str, current: &Value, incoming: Value) -> Result<Value, FactError> {
    if current.accepts(&incoming) {
        Ok(current.coerce_for(incoming))
    } else {
        Err(FactError::mismatch(
            name,
            current.type_name(),
            incoming.type_name(),
        ))
    }
}
