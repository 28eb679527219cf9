//! Type mappers: field value to bindable [`Value`] plus wire type.
//!
//! The built-in mappers, highest precedence first:
//!
//! | Mapper | Handles |
//! |--------|---------|
//! | [`ConverterMapper`] | columns naming an attribute converter |
//! | [`NamedEnumMapper`] | enum columns marked for name encoding |
//! | [`OrdinalEnumMapper`] | other enum columns |
//! | [`JsonMapper`] | JSON columns and JSON-shaped values |
//! | [`DefaultMapper`] | everything else |

use std::fmt;
use std::sync::Arc;

use upsertql_core::{
    ColumnDescriptor, ConfigError, ConversionError, EnumMode, FieldValue, Result, TypeError,
    Value, WireType,
};

use crate::converter::ConverterRegistry;
use crate::json::JsonCodec;

/// Converts field values for the columns it accepts.
pub trait TypeMapper: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this mapper handles `column`, judged by its metadata.
    fn can_handle(&self, column: &ColumnDescriptor) -> Result<bool>;

    /// Whether this mapper handles `value` regardless of the column.
    fn can_handle_value(&self, _value: &FieldValue) -> bool {
        false
    }

    fn convert_to_bindable_value(&self, value: &FieldValue, column: &ColumnDescriptor)
    -> Result<Value>;

    fn resolve_wire_type(&self, column: &ColumnDescriptor) -> WireType;
}

fn type_error(expected: &'static str, value: &FieldValue, column: &ColumnDescriptor) -> TypeError {
    TypeError {
        expected,
        actual: value.kind().to_string(),
        field: Some(column.field_name.clone()),
    }
}

/// Applies the attribute converter a column names.
#[derive(Debug, Clone)]
pub struct ConverterMapper {
    converters: Arc<ConverterRegistry>,
}

impl ConverterMapper {
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self { converters }
    }
}

impl TypeMapper for ConverterMapper {
    fn name(&self) -> &'static str {
        "converter"
    }

    fn can_handle(&self, column: &ColumnDescriptor) -> Result<bool> {
        match &column.converter {
            Some(name) if self.converters.is_registered(name) => Ok(true),
            Some(name) => Err(ConfigError::new(format!(
                "column '{}' names unregistered converter '{name}'",
                column.name
            ))
            .into()),
            None => Ok(false),
        }
    }

    fn convert_to_bindable_value(
        &self,
        value: &FieldValue,
        column: &ColumnDescriptor,
    ) -> Result<Value> {
        let Some(name) = &column.converter else {
            return Err(type_error("converted column", value, column).into());
        };
        let converter = self.converters.get(name)?;
        converter.convert_to_database_column(value).map_err(|e| {
            ConversionError {
                field: column.field_name.clone(),
                mapper: self.name().to_string(),
                message: format!("converter '{name}' failed: {e}"),
                source: Some(Box::new(e)),
            }
            .into()
        })
    }

    fn resolve_wire_type(&self, column: &ColumnDescriptor) -> WireType {
        column
            .converter
            .as_deref()
            .and_then(|name| self.converters.get(name).ok())
            .and_then(|converter| converter.wire_type())
            .unwrap_or(column.wire_type)
    }
}

/// Binds enum variants by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedEnumMapper;

impl TypeMapper for NamedEnumMapper {
    fn name(&self) -> &'static str {
        "named_enum"
    }

    fn can_handle(&self, column: &ColumnDescriptor) -> Result<bool> {
        Ok(column.value_type.is_enum() && column.enum_mode == EnumMode::Named)
    }

    fn convert_to_bindable_value(
        &self,
        value: &FieldValue,
        column: &ColumnDescriptor,
    ) -> Result<Value> {
        match value {
            FieldValue::Enum(e) => Ok(Value::Text(e.name.to_string())),
            FieldValue::Scalar(Value::Null) => Ok(Value::Null),
            other => Err(type_error("enum", other, column).into()),
        }
    }

    fn resolve_wire_type(&self, _column: &ColumnDescriptor) -> WireType {
        WireType::VARCHAR
    }
}

/// Binds enum variants by declaration index.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinalEnumMapper;

impl TypeMapper for OrdinalEnumMapper {
    fn name(&self) -> &'static str {
        "ordinal_enum"
    }

    fn can_handle(&self, column: &ColumnDescriptor) -> Result<bool> {
        Ok(column.value_type.is_enum())
    }

    fn can_handle_value(&self, value: &FieldValue) -> bool {
        matches!(value, FieldValue::Enum(_))
    }

    fn convert_to_bindable_value(
        &self,
        value: &FieldValue,
        column: &ColumnDescriptor,
    ) -> Result<Value> {
        match value {
            FieldValue::Enum(e) => Ok(Value::Int(e.ordinal)),
            FieldValue::Scalar(Value::Null) => Ok(Value::Null),
            other => Err(type_error("enum", other, column).into()),
        }
    }

    fn resolve_wire_type(&self, _column: &ColumnDescriptor) -> WireType {
        WireType::INTEGER
    }
}

/// Serializes maps, lists and application structs through a [`JsonCodec`].
#[derive(Debug, Clone)]
pub struct JsonMapper {
    codec: Arc<dyn JsonCodec>,
}

impl JsonMapper {
    pub fn new(codec: Arc<dyn JsonCodec>) -> Self {
        Self { codec }
    }
}

impl TypeMapper for JsonMapper {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_handle(&self, column: &ColumnDescriptor) -> Result<bool> {
        Ok(column.value_type.is_json())
    }

    fn can_handle_value(&self, value: &FieldValue) -> bool {
        value.is_json_shaped()
    }

    fn convert_to_bindable_value(
        &self,
        value: &FieldValue,
        column: &ColumnDescriptor,
    ) -> Result<Value> {
        let encoded = match value {
            FieldValue::Scalar(Value::Null) => return Ok(Value::Null),
            FieldValue::Scalar(Value::Json(json)) | FieldValue::Struct { data: json, .. } => {
                self.codec.encode(json)?
            }
            FieldValue::Map(map) => self.codec.encode(&serde_json::Value::Object(map.clone()))?,
            FieldValue::List(list) => self.codec.encode(&serde_json::Value::Array(list.clone()))?,
            other => return Err(type_error("JSON-shaped value", other, column).into()),
        };
        Ok(Value::Text(encoded))
    }

    fn resolve_wire_type(&self, _column: &ColumnDescriptor) -> WireType {
        WireType::OTHER
    }
}

/// Primitives, temporals, UUIDs and anything else: bound as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMapper;

impl TypeMapper for DefaultMapper {
    fn name(&self) -> &'static str {
        "default"
    }

    fn can_handle(&self, _column: &ColumnDescriptor) -> Result<bool> {
        Ok(true)
    }

    fn convert_to_bindable_value(
        &self,
        value: &FieldValue,
        _column: &ColumnDescriptor,
    ) -> Result<Value> {
        Ok(match value {
            FieldValue::Enum(e) => Value::Int(e.ordinal),
            other => other.clone().into_passthrough(),
        })
    }

    fn resolve_wire_type(&self, column: &ColumnDescriptor) -> WireType {
        column.wire_type
    }
}
