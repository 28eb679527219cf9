//! upsertql - dialect-correct batch upserts from operation names.
//!
//! An operation name such as `upsertAllOnEmailWhenVersionMoreIgnoringCreatedAt`
//! is parsed into an intent, validated against the entity's metadata into a
//! plan, and rendered as one multi-row `INSERT` with the conflict clause of
//! the target database:
//!
//! - PostgreSQL: `ON CONFLICT (...) DO UPDATE SET col = EXCLUDED.col`
//! - MySQL 8.0.19+: `AS new_values ON DUPLICATE KEY UPDATE col = new_values.col`
//! - older MySQL: `ON DUPLICATE KEY UPDATE col = VALUES(col)`
//!
//! Entity values are converted by an ordered chain of type mappers and bound
//! as batch-indexed named parameters. Execution is delegated to a
//! caller-supplied [`BatchExecutor`]; generated keys it returns are written
//! back into entities whose key fields are unset.
//!
//! # Quick Start
//!
//! ```
//! use upsertql::prelude::*;
//!
//! struct Account {
//!     id: Option<i64>,
//!     email: String,
//!     version: i64,
//! }
//!
//! impl Entity for Account {
//!     fn describe() -> std::result::Result<EntityMetadata, ValidationError> {
//!         EntityMetadata::builder("accounts")
//!             .column(ColumnDescriptor::of::<i64>("id", "id").generated(true))
//!             .column(ColumnDescriptor::of::<String>("email", "email"))
//!             .column(ColumnDescriptor::of::<i64>("version", "version"))
//!             .id("id")
//!             .unique("email")
//!             .build()
//!     }
//!
//!     fn field_value(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "id" => Some(FieldValue::scalar(self.id)),
//!             "email" => Some(FieldValue::scalar(self.email.as_str())),
//!             "version" => Some(FieldValue::scalar(self.version)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field_value(&mut self, field: &str, value: Value) -> Result<()> {
//!         if field == "id" {
//!             self.id = value.as_i64();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let ctx = UpsertContext::new(UpsertConfig::new().dialect(SqlDialect::Postgres)).unwrap();
//! let sql = ctx.prepare::<Account>("upsertAllOnEmailWhenVersionMore", 2).unwrap();
//! assert!(sql.contains("ON CONFLICT (email) DO UPDATE SET"));
//! ```

pub mod config;
pub mod context;
pub mod executor;

pub use config::{DialectSelection, UpsertConfig};
pub use context::UpsertContext;
pub use executor::{BatchExecutor, ExecutionResult};

pub use upsertql_core::{
    ColumnDescriptor, Entity, EntityMetadata, EntityMetadataProvider, EnumMode, EnumValue, Error,
    FieldValue, Result, Row, ValidationError, ValidationErrorKind, Value, ValueType, WireType,
};

pub use upsertql_query::{
    ComparisonOperator, ConditionalPredicate, OperationIntent, QueryPlan, SqlDialect,
    UpsertSqlGenerator, generator_for_dialect, parse, resolve_dialect,
};

pub use upsertql_bind::{
    AttributeConverter, BatchParameters, BoundParameter, ConverterRegistry, JsonCodec,
    PositionalStatement, SerdeJsonCodec, TypeMapper, TypeMappingRegistry,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BatchExecutor, ColumnDescriptor, Entity, EntityMetadata, EntityMetadataProvider,
        ExecutionResult, FieldValue, Result, Row, SqlDialect, UpsertConfig, UpsertContext,
        ValidationError, Value,
    };
}
