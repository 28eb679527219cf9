//! The data-access seam.
//!
//! upsertql renders and binds statements but never talks to a database.
//! Callers implement [`BatchExecutor`] over their driver of choice.

use upsertql_bind::PositionalStatement;
use upsertql_core::{Result, Row};
use upsertql_query::SqlDialect;

/// Outcome of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Rows affected as reported by the driver
    pub affected: u64,
    /// Generated column values, one row per inserted entity
    pub generated_keys: Vec<Row>,
}

/// Executes rendered upsert statements.
pub trait BatchExecutor {
    /// Dialect the statement was rendered for, useful for drivers serving
    /// several backends.
    fn execute(&mut self, dialect: SqlDialect, statement: &PositionalStatement)
    -> Result<ExecutionResult>;
}
