//! Value types exchanged between facts and rules.
//!
//! Fact fields are read into a [`Value`] when a rule references them and
//! written back from a [`Value`] when an action assigns to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically typed scalar (or list of scalars) seen by rule expressions.
///
/// # Examples
///
/// ```
/// use kyrorules::Value;
///
/// let amount = Value::Int(999_999);
/// let name = Value::from("jo");
///
/// assert!(amount.is_int());
/// assert_eq!(name.as_string(), Some("jo"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    List(Vec<Value>),
    Null,
}

impl Value {
    /// Returns true for `Bool`.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns true for `Int`.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Returns true for `Float`.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Int or float.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Returns true for `String`.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns true for `Time`.
    pub const fn is_time(&self) -> bool {
        matches!(self, Self::Time(_))
    }

    /// Returns true for `List`.
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns true for `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is a `Bool`.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The number as `f64`; ints are promoted.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The string slice, if this is a `String`.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The timestamp, if this is a `Time`.
    pub const fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// The elements, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Time(_) => "time",
            Self::List(_) => "list",
            Self::Null => "null",
        }
    }

    /// Returns true if a field currently holding `self` may be overwritten
    /// with `incoming`.
    ///
    /// Same-typed values are always compatible, ints widen into float
    /// fields, and a null field accepts anything.
    #[must_use]
    pub const fn accepts(&self, incoming: &Value) -> bool {
        matches!(
            (self, incoming),
            (Self::Null, _)
                | (Self::Bool(_), Self::Bool(_))
                | (Self::Int(_), Self::Int(_))
                | (Self::Float(_), Self::Float(_) | Self::Int(_))
                | (Self::String(_), Self::String(_))
                | (Self::Time(_), Self::Time(_))
                | (Self::List(_), Self::List(_))
        )
    }

    /// Converts `incoming` to the representation of a field currently
    /// holding `self`. Callers check [`Value::accepts`] first.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce_for(&self, incoming: Value) -> Value {
        match (self, incoming) {
            (Self::Float(_), Self::Int(v)) => Self::Float(v as f64),
            (_, v) => v,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Self::List(v) => write!(f, "list[{}]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}
