//! Core types for upsertql.
//!
//! This crate provides the leaf abstractions every other layer builds on:
//!
//! - `Value` for dynamically-typed bindable SQL values
//! - `ColumnDescriptor` for the immutable per-column metadata record
//! - `EntityMetadata` and the `EntityMetadataProvider` trait
//! - `Entity` for structs that can be upserted
//! - `SharedCache` for concurrency-safe compute-if-absent caching

pub mod cache;
pub mod column;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod row;
pub mod types;
pub mod value;

pub use cache::SharedCache;
pub use column::{ColumnDescriptor, EnumMode};
pub use entity::{Entity, EnumValue, FieldValue, MetadataCache};
pub use error::{
    BindError, ColumnViolation, ConfigError, ConversionError, Error, Result, TypeError,
    UnsupportedDatabaseError, ValidationError, ValidationErrorKind,
};
pub use metadata::{EntityMetadata, EntityMetadataBuilder, EntityMetadataProvider};
pub use row::{ColumnNames, Row};
pub use types::{TypeInfo, ValueType, WireType};
pub use value::Value;
