//! Upsert context configuration.

use serde::{Deserialize, Serialize};
use upsertql_core::Result;
use upsertql_query::{SqlDialect, resolve_dialect};

/// How the SQL dialect is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DialectSelection {
    /// Use this dialect.
    Explicit { dialect: SqlDialect },
    /// Resolve from the product name and version a connection reports.
    Probe {
        product_name: String,
        version: String,
    },
}

impl DialectSelection {
    pub fn resolve(&self) -> Result<SqlDialect> {
        match self {
            DialectSelection::Explicit { dialect } => Ok(*dialect),
            DialectSelection::Probe {
                product_name,
                version,
            } => resolve_dialect(product_name, version),
        }
    }
}

impl Default for DialectSelection {
    fn default() -> Self {
        DialectSelection::Explicit {
            dialect: SqlDialect::Postgres,
        }
    }
}

/// Configuration for an [`UpsertContext`](crate::UpsertContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertConfig {
    /// Dialect selection
    pub dialect: DialectSelection,
    /// Reject `When` clauses without a recognized operator (default: true)
    pub strict_conditions: bool,
    /// Use one multi-row statement per batch where the dialect allows it (default: true)
    pub optimized_batch: bool,
    /// Leave generated columns out of the INSERT for entities that have them
    /// unset, splitting mixed batches into runs (default: true)
    pub skip_unset_generated: bool,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            dialect: DialectSelection::default(),
            strict_conditions: true,
            optimized_batch: true,
            skip_unset_generated: true,
        }
    }
}

impl UpsertConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed dialect.
    pub fn dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = DialectSelection::Explicit { dialect };
        self
    }

    /// Resolve the dialect from connection metadata.
    pub fn probe(mut self, product_name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dialect = DialectSelection::Probe {
            product_name: product_name.into(),
            version: version.into(),
        };
        self
    }

    /// Set strict `When` clause checking.
    pub fn strict_conditions(mut self, strict: bool) -> Self {
        self.strict_conditions = strict;
        self
    }

    /// Enable or disable multi-row statements.
    pub fn optimized_batch(mut self, enabled: bool) -> Self {
        self.optimized_batch = enabled;
        self
    }

    /// Enable or disable omitting unset generated columns.
    pub fn skip_unset_generated(mut self, enabled: bool) -> Self {
        self.skip_unset_generated = enabled;
        self
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
