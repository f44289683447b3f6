//! Typed extraction of positional procedure arguments.

use chrono::NaiveDateTime;
use thiserror::Error;

use super::{parse_datetime, Map, Value, ValueKind};
use crate::error::ProcedureError;

/// A value did not have the shape a handler asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got {found}")]
pub struct ValueTypeError {
    /// What the handler asked for.
    pub expected: &'static str,
    /// What was actually received.
    pub found: ValueKind,
}

impl ValueTypeError {
    const fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.kind(),
        }
    }
}

/// Conversion from a borrowed [`Value`] into a handler-side Rust type.
pub trait FromValue: Sized {
    /// Converts `value`, failing when its kind does not fit.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueTypeError`] describing the mismatch.
    fn from_value(value: &Value) -> Result<Self, ValueTypeError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_bool()
            .ok_or_else(|| ValueTypeError::new("boolean", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value.as_i64().ok_or_else(|| ValueTypeError::new("int", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_i64()
            .and_then(|i| Self::try_from(i).ok())
            .ok_or_else(|| ValueTypeError::new("32-bit int", value))
    }
}

// Integers widen to doubles; XML-RPC clients routinely send `<int>` for
// whole-number doubles.
#[allow(clippy::cast_precision_loss)]
impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as Self),
            other => Err(ValueTypeError::new("double", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| ValueTypeError::new("string", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ValueTypeError::new("base64", value))
    }
}

// JSON-RPC has no timestamp type, so ISO-8601 strings are accepted too.
impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => {
                parse_datetime(s).ok_or_else(|| ValueTypeError::new("dateTime.iso8601", value))
            }
            other => Err(ValueTypeError::new("dateTime.iso8601", other)),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_list()
            .map(<[Value]>::to_vec)
            .ok_or_else(|| ValueTypeError::new("array", value))
    }
}

impl FromValue for Map {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        value
            .as_map()
            .cloned()
            .ok_or_else(|| ValueTypeError::new("struct", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ValueTypeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Positional arguments of a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    /// Fails unless exactly `count` arguments were passed.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::InvalidParams`] on a count mismatch.
    pub fn expect_len(&self, count: usize) -> Result<(), ProcedureError> {
        if self.0.len() == count {
            Ok(())
        } else {
            Err(ProcedureError::InvalidParams(format!(
                "expected {count} argument(s), got {}",
                self.0.len()
            )))
        }
    }

    /// Converts the argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::InvalidParams`] if the argument is missing
    /// or has the wrong kind.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, ProcedureError> {
        let value = self.0.get(index).ok_or_else(|| {
            ProcedureError::InvalidParams(format!("missing argument at position {index}"))
        })?;
        T::from_value(value).map_err(|e| {
            ProcedureError::InvalidParams(format!("argument at position {index}: {e}"))
        })
    }

    /// Converts the argument at `index` if it was passed and is not null.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::InvalidParams`] if the argument has the
    /// wrong kind.
    pub fn optional<T: FromValue>(&self, index: usize) -> Result<Option<T>, ProcedureError> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(index).map(Some),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
