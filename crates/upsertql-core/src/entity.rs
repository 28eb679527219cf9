//! Entity trait and field values.
//!
//! An [`Entity`] describes its own mapping once and exposes its fields by
//! name. That replaces runtime reflection: metadata is resolved on first use
//! and cached per type in a [`MetadataCache`].

use std::any::TypeId;
use std::sync::Arc;

use crate::Result;
use crate::cache::SharedCache;
use crate::error::ValidationError;
use crate::metadata::EntityMetadata;
use crate::value::Value;

/// An enum variant as read from an entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Rust type name of the enum
    pub type_name: &'static str,
    /// Variant name
    pub name: &'static str,
    /// Zero-based declaration index
    pub ordinal: i32,
}

/// The raw value of an entity field, before type mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Primitive, temporal or UUID value (including NULL)
    Scalar(Value),
    /// Enum variant
    Enum(EnumValue),
    /// Generic map shape
    Map(serde_json::Map<String, serde_json::Value>),
    /// Generic collection shape
    List(Vec<serde_json::Value>),
    /// Application-defined struct, already in serde data-model form
    Struct {
        type_name: &'static str,
        data: serde_json::Value,
    },
    /// Library-defined type that must not be treated as JSON
    Opaque { type_name: &'static str, value: Value },
}

impl FieldValue {
    /// Wrap a scalar.
    pub fn scalar(value: impl Into<Value>) -> Self {
        FieldValue::Scalar(value.into())
    }

    /// Check if this is an unset (NULL) value.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }

    /// Human-readable kind, used in logs and type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Scalar(v) => v.kind(),
            FieldValue::Enum(e) => e.type_name,
            FieldValue::Map(_) => "map",
            FieldValue::List(_) => "list",
            FieldValue::Struct { type_name, .. } | FieldValue::Opaque { type_name, .. } => {
                type_name
            }
        }
    }

    /// Heuristic: is this value a candidate for JSON serialization?
    ///
    /// Primitives, temporals, UUIDs, enums and library-defined types are not;
    /// maps, collections and application structs are.
    pub fn is_json_shaped(&self) -> bool {
        matches!(
            self,
            FieldValue::Map(_) | FieldValue::List(_) | FieldValue::Struct { .. }
        )
    }

    /// The value as bound when no mapper converts it.
    ///
    /// Enums pass through as their variant name and JSON shapes as a raw
    /// JSON value.
    pub fn into_passthrough(self) -> Value {
        match self {
            FieldValue::Scalar(v) | FieldValue::Opaque { value: v, .. } => v,
            FieldValue::Enum(e) => Value::Text(e.name.to_string()),
            FieldValue::Map(m) => Value::Json(serde_json::Value::Object(m)),
            FieldValue::List(l) => Value::Json(serde_json::Value::Array(l)),
            FieldValue::Struct { data, .. } => Value::Json(data),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Scalar(v)
    }
}

/// A struct that can be upserted.
///
/// # Example
///
/// ```
/// use upsertql_core::{ColumnDescriptor, Entity, EntityMetadata, FieldValue, Result, Value};
/// use upsertql_core::error::{BindError, ValidationError};
///
/// struct Tag {
///     id: Option<i64>,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn describe() -> std::result::Result<EntityMetadata, ValidationError> {
///         EntityMetadata::builder("tags")
///             .column(ColumnDescriptor::of::<i64>("id", "id").generated(true))
///             .column(ColumnDescriptor::of::<String>("label", "label"))
///             .id("id")
///             .unique("label")
///             .build()
///     }
///
///     fn field_value(&self, field: &str) -> Option<FieldValue> {
///         match field {
///             "id" => Some(FieldValue::scalar(self.id)),
///             "label" => Some(FieldValue::scalar(self.label.as_str())),
///             _ => None,
///         }
///     }
///
///     fn set_field_value(&mut self, field: &str, value: Value) -> Result<()> {
///         match field {
///             "id" => {
///                 self.id = value.as_i64();
///                 Ok(())
///             }
///             other => Err(BindError {
///                 name: other.to_string(),
///                 message: "field is not writable".to_string(),
///             }
///             .into()),
///         }
///     }
/// }
///
/// assert_eq!(Tag::describe().unwrap().columns().len(), 2);
/// # use upsertql_core::EntityMetadataProvider;
/// ```
pub trait Entity: Send + Sync + 'static {
    /// Describe the table mapping. Called once per type and cached.
    fn describe() -> std::result::Result<EntityMetadata, ValidationError>;

    /// Read a field by entity field name. `None` for unknown fields.
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// Write a field by entity field name (used for generated keys).
    fn set_field_value(&mut self, field: &str, value: Value) -> Result<()>;
}

/// Process-wide metadata cache keyed by entity type.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: SharedCache<TypeId, EntityMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve metadata for `E`, describing it on first access.
    pub fn get<E: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.entries
            .try_get_or_insert_with(TypeId::of::<E>(), || {
                tracing::debug!(
                    entity = std::any::type_name::<E>(),
                    "Resolving entity metadata"
                );
                E::describe()
            })
            .map_err(Into::into)
    }

    /// Number of entity types resolved so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
