//! Values as they cross the driver boundary.

use serde::{Deserialize, Serialize};

/// One bound parameter value, or one value read back from a result row.
///
/// Only the shapes the type mappers emit are represented. Narrower Rust
/// numbers widen on conversion (`i16` to `Int`, `f32` to `Double`), and
/// JSON documents stay structured until a codec renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    /// Exact numeric kept in its textual form
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
    Json(serde_json::Value),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label for logs and type errors.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
        }
    }

    /// Integer view, used when writing generated keys back.
    ///
    /// Drivers disagree on the key's width and some report it as text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Decimal(s) | Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($source:ty => |$v:ident| $make:expr),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from($v: $source) -> Self {
                    $make
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Value::Bool(v),
    i16 => |v| Value::Int(i32::from(v)),
    i32 => |v| Value::Int(v),
    i64 => |v| Value::BigInt(v),
    f32 => |v| Value::Double(f64::from(v)),
    f64 => |v| Value::Double(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_owned()),
    Vec<u8> => |v| Value::Bytes(v),
    serde_json::Value => |v| Value::Json(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_none_to_null() {
        assert_eq!(Value::from(Some(5_i64)), Value::BigInt(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_narrow_numbers_widen() {
        assert_eq!(Value::from(7_i16), Value::Int(7));
        assert_eq!(Value::from(0.5_f32), Value::Double(0.5));
    }

    #[test]
    fn test_as_i64_accepts_driver_key_shapes() {
        assert_eq!(Value::Int(-4).as_i64(), Some(-4));
        assert_eq!(Value::BigInt(9).as_i64(), Some(9));
        assert_eq!(Value::Text("42".into()).as_i64(), Some(42));
        assert_eq!(Value::Double(1.0).as_i64(), None);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::Json(serde_json::json!([])).kind(), "json");
    }
}
