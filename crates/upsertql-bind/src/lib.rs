//! Type mapping and parameter binding for upsertql.
//!
//! Turns entity batches into the named parameter map a generated statement
//! expects, and writes generated keys back afterwards.

pub mod converter;
pub mod json;
pub mod keys;
pub mod mapper;
pub mod params;
pub mod registry;

pub use converter::{AttributeConverter, ConverterRegistry};
pub use json::{JsonCodec, SerdeJsonCodec};
pub use keys::{GENERATED_KEY_ALIASES, apply_generated_keys};
pub use mapper::{
    ConverterMapper, DefaultMapper, JsonMapper, NamedEnumMapper, OrdinalEnumMapper, TypeMapper,
};
pub use params::{BatchParameterSource, BatchParameters, PositionalStatement, parameter_name};
pub use registry::{BoundParameter, TypeMappingRegistry};
