//! Dynamic values crossing the RPC boundary.
//!
//! Every argument and result travels through the dispatcher as a [`Value`].
//! The protocol codecs in [`crate::protocol`] translate between this closed
//! set of variants and each wire format.
//!
//! # Kinds
//!
//! | Variant    | Kind name          | JSON-RPC wire     | XML-RPC wire         |
//! |------------|--------------------|-------------------|----------------------|
//! | `Null`     | `nil`              | `null`            | `<nil/>`             |
//! | `Bool`     | `boolean`          | `true`/`false`    | `<boolean>`          |
//! | `Int`      | `int`              | number            | `<int>` / `<i8>`     |
//! | `Float`    | `double`           | number            | `<double>`           |
//! | `String`   | `string`           | string            | `<string>`           |
//! | `Bytes`    | `base64`           | base64 string     | `<base64>`           |
//! | `DateTime` | `dateTime.iso8601` | ISO-8601 string   | `<dateTime.iso8601>` |
//! | `List`     | `array`            | array             | `<array>`            |
//! | `Map`      | `struct`           | object            | `<struct>`           |

mod convert;

pub use convert::{FromValue, Params, ValueTypeError};

use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;

/// String-keyed map of values. Insertion order is kept for output stability;
/// equality ignores order.
pub type Map = IndexMap<String, Value>;

/// A value that can be passed to or returned from a procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// Raw byte sequence, distinct from text.
    Bytes(Vec<u8>),
    /// Calendar date and wall-clock time without timezone.
    DateTime(NaiveDateTime),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed map.
    Map(Map),
}

/// The variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// See [`Value::Null`].
    Null,
    /// See [`Value::Bool`].
    Bool,
    /// See [`Value::Int`].
    Int,
    /// See [`Value::Float`].
    Float,
    /// See [`Value::String`].
    String,
    /// See [`Value::Bytes`].
    Bytes,
    /// See [`Value::DateTime`].
    DateTime,
    /// See [`Value::List`].
    List,
    /// See [`Value::Map`].
    Map,
}

impl ValueKind {
    /// Returns the XML-RPC type name used for this kind in introspection
    /// output and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "nil",
            Self::Bool => "boolean",
            Self::Int => "int",
            Self::Float => "double",
            Self::String => "string",
            Self::Bytes => "base64",
            Self::DateTime => "dateTime.iso8601",
            Self::List => "array",
            Self::Map => "struct",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Creates a byte-sequence value.
    #[must_use]
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(data.into())
    }

    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Map(map)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Self>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Text layouts accepted for timestamps, compact XML-RPC form first.
const DATETIME_FORMATS: [&str; 3] = ["%Y%m%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

/// Parses an ISO-8601 style timestamp as produced by either protocol.
///
/// Accepts `19870602T08:45:00`, `1987-06-02T08:45:00` and `19870602T084500`,
/// each optionally followed by `Z`. Returns `None` for anything else.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let text = text.strip_suffix('Z').unwrap_or(text);
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}
