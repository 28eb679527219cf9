//! Named attribute converters.
//!
//! A column may name a converter (see `ColumnDescriptor::converter`). The
//! converter is built from its registered factory on first use and the
//! instance is shared from then on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use upsertql_core::{ConfigError, FieldValue, Result, SharedCache, Value, WireType};

/// Converts one entity attribute to its database representation.
pub trait AttributeConverter: Send + Sync {
    fn convert_to_database_column(&self, value: &FieldValue) -> Result<Value>;

    /// Wire type of the converted value. `None` keeps the column's own type.
    fn wire_type(&self) -> Option<WireType> {
        None
    }
}

type ConverterFactory = Arc<dyn Fn() -> Box<dyn AttributeConverter> + Send + Sync>;

/// Converter factories by name plus the cache of built instances.
#[derive(Default)]
pub struct ConverterRegistry {
    factories: HashMap<String, ConverterFactory>,
    instances: SharedCache<String, Box<dyn AttributeConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter factory under `name`, replacing any previous one.
    #[must_use]
    pub fn register<F, C>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: AttributeConverter + 'static,
    {
        let factory: ConverterFactory = Arc::new(move || Box::new(factory()));
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolve the shared converter instance for `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Box<dyn AttributeConverter>>> {
        self.instances.try_get_or_insert_with(name.to_string(), || {
            let factory = self.factories.get(name).ok_or_else(|| {
                ConfigError::new(format!("no attribute converter registered as '{name}'"))
            })?;
            tracing::debug!(converter = name, "Instantiating attribute converter");
            Ok(factory())
        })
    }

    /// Number of converter instances built so far.
    pub fn instantiated(&self) -> usize {
        self.instances.len()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ConverterRegistry")
            .field("factories", &names)
            .field("instantiated", &self.instances.len())
            .finish()
    }
}
