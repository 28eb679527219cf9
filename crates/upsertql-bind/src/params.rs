//! Named parameter sources for batch statements.
//!
//! A batch statement names row `i` (1-based) of field `f` as `:f_i`. The
//! [`BatchParameterSource`] produces exactly that map from a slice of
//! entities, and [`BatchParameters::expand`] rewrites the named statement
//! into the positional form drivers accept.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use upsertql_core::{BindError, Entity, Result};
use upsertql_query::{QueryPlan, SqlDialect};

use crate::registry::{BoundParameter, TypeMappingRegistry};

fn named_parameter() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("static named parameter pattern")
    })
}

/// Parameter name for `field` in 1-based row `row`.
pub fn parameter_name(field: &str, row: usize) -> String {
    format!("{field}_{row}")
}

/// Bound values of one batch, by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchParameters {
    values: HashMap<String, BoundParameter>,
    rows: usize,
}

impl BatchParameters {
    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        self.values.get(name)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of entity rows bound.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Parameter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rewrite `:name` placeholders into the dialect's positional form.
    ///
    /// Returns the rewritten SQL and the parameters in placeholder order.
    /// Every placeholder must have a bound value.
    pub fn expand(&self, sql: &str, dialect: SqlDialect) -> Result<PositionalStatement> {
        let mut out = String::with_capacity(sql.len());
        let mut params = Vec::with_capacity(self.values.len());
        let mut last = 0;

        for caps in named_parameter().captures_iter(sql) {
            let Some(whole) = caps.get(0) else { continue };
            let name = &caps[1];
            let bound = self.values.get(name).ok_or_else(|| BindError {
                name: name.to_string(),
                message: "no value bound for placeholder".to_string(),
            })?;
            out.push_str(&sql[last..whole.start()]);
            params.push(bound.clone());
            out.push_str(&dialect.placeholder(params.len()));
            last = whole.end();
        }
        out.push_str(&sql[last..]);

        Ok(PositionalStatement { sql: out, params })
    }
}

/// A statement with positional placeholders and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionalStatement {
    pub sql: String,
    pub params: Vec<BoundParameter>,
}

/// Converts entity batches into [`BatchParameters`].
#[derive(Debug, Clone, Copy)]
pub struct BatchParameterSource<'a> {
    registry: &'a TypeMappingRegistry,
}

impl<'a> BatchParameterSource<'a> {
    pub fn new(registry: &'a TypeMappingRegistry) -> Self {
        Self { registry }
    }

    /// Bind every value column of every entity, rows numbered from 1.
    pub fn bind<E: Entity>(&self, plan: &QueryPlan, entities: &[E]) -> Result<BatchParameters> {
        let mut values = HashMap::with_capacity(entities.len() * plan.value_columns().len());

        for (i, entity) in entities.iter().enumerate() {
            let row = i + 1;
            for column in plan.value_columns() {
                let field_value = entity.field_value(&column.field_name).ok_or_else(|| BindError {
                    name: column.field_name.clone(),
                    message: format!(
                        "entity for table '{}' does not expose this field",
                        plan.table_name()
                    ),
                })?;
                let bound = self.registry.bind(&field_value, column);
                values.insert(parameter_name(&column.field_name, row), bound);
            }
        }

        tracing::trace!(
            table = plan.table_name(),
            rows = entities.len(),
            parameters = values.len(),
            "Bound batch parameters"
        );

        Ok(BatchParameters {
            values,
            rows: entities.len(),
        })
    }
}
