//! Ordered type-mapper registry.
//!
//! Mapper selection for a column walks the configured list and takes the
//! first mapper whose `can_handle` accepts the column. When converting a
//! value and no mapper claims the column, the first mapper that claims the
//! value itself is used. The default mapper catches everything else.
//!
//! Neither selection nor conversion fails: a mapper whose `can_handle`
//! errors is skipped, and a failed conversion binds the original value.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use upsertql_core::{ColumnDescriptor, FieldValue, Value, WireType};

use crate::converter::ConverterRegistry;
use crate::json::{JsonCodec, SerdeJsonCodec};
use crate::mapper::{
    ConverterMapper, DefaultMapper, JsonMapper, NamedEnumMapper, OrdinalEnumMapper, TypeMapper,
};

/// A value ready to bind plus the wire type to bind it as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    pub value: Value,
    pub wire_type: WireType,
}

pub struct TypeMappingRegistry {
    mappers: Vec<Arc<dyn TypeMapper>>,
    default: Arc<dyn TypeMapper>,
}

impl TypeMappingRegistry {
    /// A registry with the given mappers, in precedence order.
    pub fn new(mappers: Vec<Arc<dyn TypeMapper>>) -> Self {
        Self {
            mappers,
            default: Arc::new(DefaultMapper),
        }
    }

    /// The built-in mapper chain.
    pub fn with_defaults(codec: Arc<dyn JsonCodec>, converters: Arc<ConverterRegistry>) -> Self {
        Self::new(vec![
            Arc::new(ConverterMapper::new(converters)),
            Arc::new(NamedEnumMapper),
            Arc::new(OrdinalEnumMapper),
            Arc::new(JsonMapper::new(codec)),
        ])
    }

    /// Replace the fallback mapper.
    #[must_use]
    pub fn with_default_mapper(mut self, mapper: Arc<dyn TypeMapper>) -> Self {
        self.default = mapper;
        self
    }

    /// Mapper names in precedence order, default last.
    pub fn mapper_names(&self) -> Vec<&'static str> {
        self.mappers
            .iter()
            .chain(std::iter::once(&self.default))
            .map(|m| m.name())
            .collect()
    }

    fn mapper_for_column(&self, column: &ColumnDescriptor) -> Option<&dyn TypeMapper> {
        self.mappers.iter().map(|m| &**m).find(|mapper| {
            match mapper.can_handle(column) {
                Ok(handles) => handles,
                Err(e) => {
                    tracing::debug!(
                        mapper = mapper.name(),
                        field = %column.field_name,
                        error = %e,
                        "Mapper lookup failed, skipping"
                    );
                    false
                }
            }
        })
    }

    fn mapper_for(&self, value: &FieldValue, column: &ColumnDescriptor) -> &dyn TypeMapper {
        self.mapper_for_column(column)
            .or_else(|| {
                self.mappers
                    .iter()
                    .map(|m| &**m)
                    .find(|mapper| mapper.can_handle_value(value))
            })
            .unwrap_or(&*self.default)
    }

    /// Wire type for a column, judged by its metadata alone.
    pub fn resolve_wire_type(&self, column: &ColumnDescriptor) -> WireType {
        self.mapper_for_column(column)
            .unwrap_or(&*self.default)
            .resolve_wire_type(column)
    }

    /// Convert a field value to its bindable form.
    ///
    /// On conversion failure the original value is returned.
    pub fn convert_to_bindable_value(&self, value: &FieldValue, column: &ColumnDescriptor) -> Value {
        self.bind(value, column).value
    }

    /// Convert a field value and resolve its wire type with the same mapper.
    pub fn bind(&self, value: &FieldValue, column: &ColumnDescriptor) -> BoundParameter {
        let mapper = self.mapper_for(value, column);
        let wire_type = mapper.resolve_wire_type(column);
        match mapper.convert_to_bindable_value(value, column) {
            Ok(value) => BoundParameter { value, wire_type },
            Err(e) => {
                tracing::warn!(
                    mapper = mapper.name(),
                    field = %column.field_name,
                    error = %e,
                    "Conversion failed, binding original value"
                );
                BoundParameter {
                    value: value.clone().into_passthrough(),
                    wire_type: column.wire_type,
                }
            }
        }
    }
}

impl Default for TypeMappingRegistry {
    fn default() -> Self {
        Self::with_defaults(Arc::new(SerdeJsonCodec), Arc::new(ConverterRegistry::new()))
    }
}

impl fmt::Debug for TypeMappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMappingRegistry")
            .field("mappers", &self.mapper_names())
            .finish()
    }
}
