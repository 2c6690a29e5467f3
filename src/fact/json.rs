//! `Fact` implementation for JSON objects.
//!
//! Lets hosts that already carry their facts as `serde_json::Value` expose
//! them to rules without defining Rust types. Nested objects act as nested
//! records; arrays of scalars read as lists. Fields must exist before a rule
//! can assign them.

use serde_json::{Map, Number, Value as Json};

use crate::error::FactError;
use crate::value::Value;

use super::{check_assignable, Fact};

/// Converts a JSON scalar or array to a rule [`Value`].
pub fn from_json(name: &str, json: &Json) -> Result<Value, FactError> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => Ok(n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null)),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(|item| from_json(name, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Json::Object(_) => Err(FactError::mismatch(name, "value", "record")),
    }
}

/// Converts a rule [`Value`] to JSON.
///
/// Times are written as RFC 3339 strings. Non-finite floats cannot be
/// represented and are rejected.
pub fn to_json(name: &str, value: Value) -> Result<Json, FactError> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(b)),
        Value::Int(i) => Ok(Json::Number(i.into())),
        Value::Float(f) => Number::from_f64(f)
            .map(Json::Number)
            .ok_or_else(|| FactError::mismatch(name, "finite float", "float")),
        Value::String(s) => Ok(Json::String(s)),
        Value::Time(t) => Ok(Json::String(t.to_rfc3339())),
        Value::List(items) => items
            .into_iter()
            .map(|item| to_json(name, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
    }
}

fn object<'j>(json: &'j Json, name: &str) -> Result<&'j Map<String, Json>, FactError> {
    json.as_object()
        .ok_or_else(|| FactError::mismatch(name, "record", "value"))
}

impl Fact for Json {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        let map = object(self, name)?;
        let json = map.get(name).ok_or_else(|| FactError::not_found(name))?;
        from_json(name, json)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FactError> {
        let map = self
            .as_object_mut()
            .ok_or_else(|| FactError::mismatch(name, "record", "value"))?;
        let slot = map.get_mut(name).ok_or_else(|| FactError::not_found(name))?;
        let current = from_json(name, slot)?;
        let value = check_assignable(name, &current, value)?;
        *slot = to_json(name, value)?;
        Ok(())
    }

    fn nested(&self, name: &str) -> Option<&dyn Fact> {
        let nested = self.as_object()?.get(name)?;
        nested.is_object().then_some(nested as &dyn Fact)
    }

    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn Fact> {
        let nested = self.as_object_mut()?.get_mut(name)?;
        if nested.is_object() {
            Some(nested as &mut dyn Fact)
        } else {
            None
        }
    }
}
