//! Column descriptors.

use std::hash::{Hash, Hasher};

use crate::types::{TypeInfo, ValueType, WireType};

/// How an enum field is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumMode {
    /// Store the variant ordinal as an integer.
    #[default]
    Ordinal,
    /// Store the variant name as a string.
    Named,
}

/// Immutable metadata about one mapped entity field.
///
/// Descriptors are created once when an entity's metadata is resolved and
/// never mutated afterwards. Two descriptors are equal when they map the
/// same field to the same column.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// SQL column name
    pub name: String,
    /// Entity field name
    pub field_name: String,
    /// Logical type of the field
    pub value_type: ValueType,
    /// Default wire type code for binding
    pub wire_type: WireType,
    /// Whether the database generates this column's value
    pub generated: bool,
    /// Enum persistence mode (only meaningful for enum fields)
    pub enum_mode: EnumMode,
    /// Name of an explicitly attached attribute converter
    pub converter: Option<String>,
}

impl ColumnDescriptor {
    /// Create a descriptor; the wire type is derived from the value type.
    pub fn new(name: impl Into<String>, field_name: impl Into<String>, value_type: ValueType) -> Self {
        let wire_type = value_type.wire_type();
        Self {
            name: name.into(),
            field_name: field_name.into(),
            value_type,
            wire_type,
            generated: false,
            enum_mode: EnumMode::Ordinal,
            converter: None,
        }
    }

    /// Create a descriptor for a Rust type implementing [`TypeInfo`].
    pub fn of<T: TypeInfo>(name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::new(name, field_name, T::VALUE_TYPE)
    }

    /// Override the wire type.
    pub fn wire_type(mut self, wire_type: WireType) -> Self {
        self.wire_type = wire_type;
        self
    }

    /// Mark the column as database-generated.
    pub fn generated(mut self, value: bool) -> Self {
        self.generated = value;
        self
    }

    /// Persist this enum field by variant name instead of ordinal.
    pub fn named_enum(mut self) -> Self {
        self.enum_mode = EnumMode::Named;
        self.wire_type = WireType::VARCHAR;
        self
    }

    /// Attach a named attribute converter.
    pub fn converter(mut self, name: impl Into<String>) -> Self {
        self.converter = Some(name.into());
        self
    }

    /// Does `name` refer to this column, either by SQL name or field name?
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.field_name == name
    }
}

impl PartialEq for ColumnDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.field_name == other.field_name
    }
}

impl Eq for ColumnDescriptor {}

impl Hash for ColumnDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.field_name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_type_details() {
        let a = ColumnDescriptor::of::<i64>("version", "version");
        let b = ColumnDescriptor::of::<i32>("version", "version").generated(true);
        assert_eq!(a, b);
        assert_ne!(a, ColumnDescriptor::of::<i64>("version", "rev"));
    }

    #[test]
    fn test_named_enum_switches_wire_type() {
        let col = ColumnDescriptor::new("status", "status", ValueType::Enum("Status"));
        assert_eq!(col.wire_type, WireType::INTEGER);
        let named = col.named_enum();
        assert_eq!(named.enum_mode, EnumMode::Named);
        assert_eq!(named.wire_type, WireType::VARCHAR);
    }

    #[test]
    fn test_matches_by_column_or_field() {
        let col = ColumnDescriptor::of::<String>("user_name", "userName");
        assert!(col.matches("user_name"));
        assert!(col.matches("userName"));
        assert!(!col.matches("username"));
    }
}
