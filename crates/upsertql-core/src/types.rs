//! Field value types and wire type codes.

use serde::{Deserialize, Serialize};

/// Database-level type code used when binding a parameter.
///
/// Codes follow the `java.sql.Types` numbering that JDBC-style drivers
/// expect, so a data-access layer can pass them straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireType(pub i32);

impl WireType {
    pub const NULL: WireType = WireType(0);
    pub const BIT: WireType = WireType(-7);
    pub const BOOLEAN: WireType = WireType(16);
    pub const SMALLINT: WireType = WireType(5);
    pub const INTEGER: WireType = WireType(4);
    pub const BIGINT: WireType = WireType(-5);
    pub const REAL: WireType = WireType(7);
    pub const DOUBLE: WireType = WireType(8);
    pub const DECIMAL: WireType = WireType(3);
    pub const CHAR: WireType = WireType(1);
    pub const VARCHAR: WireType = WireType(12);
    pub const BINARY: WireType = WireType(-2);
    pub const VARBINARY: WireType = WireType(-3);
    pub const DATE: WireType = WireType(91);
    pub const TIME: WireType = WireType(92);
    pub const TIMESTAMP: WireType = WireType(93);
    pub const TIMESTAMP_WITH_TIMEZONE: WireType = WireType(2014);
    pub const OTHER: WireType = WireType(1111);
    pub const JAVA_OBJECT: WireType = WireType(2000);
    pub const ARRAY: WireType = WireType(2003);

    /// The raw integer code.
    pub const fn code(self) -> i32 {
        self.0
    }
}

/// Logical type of an entity field.
///
/// This is the "value type tag" of a column descriptor. It drives the
/// default wire type and lets mappers decide whether they handle a field
/// without inspecting a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    String,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    /// A Rust enum persisted by ordinal or by name
    Enum(&'static str),
    /// Map, list or application struct stored as a JSON document
    Json(&'static str),
    /// Library-defined type passed through without JSON treatment
    Custom(&'static str),
}

impl ValueType {
    /// Default wire type for values of this type.
    pub const fn wire_type(&self) -> WireType {
        match self {
            ValueType::Bool => WireType::BOOLEAN,
            ValueType::SmallInt => WireType::SMALLINT,
            ValueType::Int | ValueType::Enum(_) => WireType::INTEGER,
            ValueType::BigInt => WireType::BIGINT,
            ValueType::Float => WireType::REAL,
            ValueType::Double => WireType::DOUBLE,
            ValueType::Decimal => WireType::DECIMAL,
            ValueType::String => WireType::VARCHAR,
            ValueType::Bytes => WireType::VARBINARY,
            ValueType::Date => WireType::DATE,
            ValueType::Time => WireType::TIME,
            ValueType::Timestamp => WireType::TIMESTAMP,
            ValueType::TimestampTz => WireType::TIMESTAMP_WITH_TIMEZONE,
            ValueType::Uuid | ValueType::Json(_) | ValueType::Custom(_) => WireType::OTHER,
        }
    }

    pub const fn is_enum(&self) -> bool {
        matches!(self, ValueType::Enum(_))
    }

    pub const fn is_json(&self) -> bool {
        matches!(self, ValueType::Json(_))
    }
}

/// Trait for Rust types that have a corresponding field value type.
pub trait TypeInfo {
    /// The value type tag for this Rust type.
    const VALUE_TYPE: ValueType;
}

impl TypeInfo for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;
}

impl TypeInfo for i16 {
    const VALUE_TYPE: ValueType = ValueType::SmallInt;
}

impl TypeInfo for i32 {
    const VALUE_TYPE: ValueType = ValueType::Int;
}

impl TypeInfo for i64 {
    const VALUE_TYPE: ValueType = ValueType::BigInt;
}

impl TypeInfo for f32 {
    const VALUE_TYPE: ValueType = ValueType::Float;
}

impl TypeInfo for f64 {
    const VALUE_TYPE: ValueType = ValueType::Double;
}

impl TypeInfo for String {
    const VALUE_TYPE: ValueType = ValueType::String;
}

impl TypeInfo for Vec<u8> {
    const VALUE_TYPE: ValueType = ValueType::Bytes;
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;
}
