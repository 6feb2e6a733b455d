//! SQL value types for database-agnostic row conversion.
//!
//! Values are owned: a row read from the source is converted into a new row
//! for the destination and never shared with the reader's buffers.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of a [`SqlValue`], used for diagnostics in converter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlKind::Null => "null",
            SqlKind::Bool => "boolean",
            SqlKind::Int => "integer",
            SqlKind::Float => "float",
            SqlKind::Text => "text",
            SqlKind::Bytes => "binary",
            SqlKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A single field value.
///
/// Drivers decode engine-specific types into this small set. Types without a
/// dedicated variant (decimal, date, time, uuid, json, enum) travel as text,
/// which both supported destinations parse back into the column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value (all integer widths are widened to 64 bits).
    Int(i64),

    /// Floating point value.
    Float(f64),

    /// Text/string data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Timestamp without timezone; timezone-aware sources are normalized to UTC.
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Get the kind of this value.
    #[must_use]
    pub fn kind(&self) -> SqlKind {
        match self {
            SqlValue::Null => SqlKind::Null,
            SqlValue::Bool(_) => SqlKind::Bool,
            SqlValue::Int(_) => SqlKind::Int,
            SqlValue::Float(_) => SqlKind::Float,
            SqlValue::Text(_) => SqlKind::Text,
            SqlValue::Bytes(_) => SqlKind::Bytes,
            SqlValue::Timestamp(_) => SqlKind::Timestamp,
        }
    }

    /// Integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

/// Widens through the shortest decimal that round-trips the `f32`, so
/// `0.1f32` becomes `0.1` and not `0.10000000149011612`.
impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(v.to_string().parse().unwrap_or(f64::from(v)))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Bytes(v.to_vec())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Int(42).is_null());
    }

    #[test]
    fn test_f32_keeps_its_decimal_value() {
        assert_eq!(SqlValue::from(0.1f32), SqlValue::Float(0.1));
        assert_eq!(SqlValue::from(-3.75f32), SqlValue::Float(-3.75));
        assert_eq!(SqlValue::from(Some(1.1f32)), SqlValue::Float(1.1));
        assert_eq!(SqlValue::from(f32::INFINITY), SqlValue::Float(f64::INFINITY));
        assert!(matches!(SqlValue::from(f32::NAN), SqlValue::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_from_implementations() {
        let v: SqlValue = 42i32.into();
        assert_eq!(v, SqlValue::Int(42));

        let v: SqlValue = "hello".into();
        assert_eq!(v, SqlValue::Text("hello".to_string()));

        let v: SqlValue = None::<i64>.into();
        assert_eq!(v, SqlValue::Null);

        let v: SqlValue = Some(1.5f64).into();
        assert_eq!(v, SqlValue::Float(1.5));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SqlValue::Bool(true).kind().to_string(), "boolean");
        assert_eq!(SqlValue::Bytes(vec![1]).kind(), SqlKind::Bytes);
    }
}
