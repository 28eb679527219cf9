//! Batch upsert SQL generation for each supported database dialect.
//!
//! Every generator produces the same statement shape: one `INSERT` carrying
//! `batch_size` value tuples whose named placeholders are suffixed with a
//! 1-based row index (`:name_1`, `:name_2`, ...), followed by a single
//! conflict clause shared by all rows.

mod mysql;
mod postgres;

pub use mysql::{MysqlLegacyUpsertGenerator, MysqlUpsertGenerator};
pub use postgres::PostgresUpsertGenerator;

use std::fmt;

use serde::{Deserialize, Serialize};
use upsertql_core::{ColumnDescriptor, Result, UnsupportedDatabaseError};

use crate::plan::QueryPlan;

/// SQL dialect of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    /// `INSERT ... ON CONFLICT (...) DO UPDATE`
    Postgres,
    /// MySQL 8.0.19+: `INSERT ... AS new_values ON DUPLICATE KEY UPDATE`
    Mysql,
    /// MySQL before 8.0.19: `ON DUPLICATE KEY UPDATE col = VALUES(col)`
    MysqlLegacy,
}

impl SqlDialect {
    pub const fn name(self) -> &'static str {
        match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::Mysql => "mysql",
            SqlDialect::MysqlLegacy => "mysql_legacy",
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${index}"),
            SqlDialect::Mysql | SqlDialect::MysqlLegacy => "?".to_string(),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates batch upsert statements from validated plans.
pub trait UpsertSqlGenerator: Send + Sync {
    /// The dialect this generator targets.
    fn dialect(&self) -> SqlDialect;

    /// Render one statement covering `batch_size` rows.
    ///
    /// A `batch_size` of zero is treated as one.
    fn generate_batch_upsert_sql(&self, plan: &QueryPlan, batch_size: usize) -> String;

    /// Whether a multi-row statement is safe for this dialect.
    ///
    /// When `false` callers should execute the single-row statement once
    /// per entity instead.
    fn supports_optimized_batch(&self) -> bool;
}

/// Create a generator for the given dialect.
pub fn generator_for_dialect(dialect: SqlDialect) -> Box<dyn UpsertSqlGenerator> {
    match dialect {
        SqlDialect::Postgres => Box::new(PostgresUpsertGenerator),
        SqlDialect::Mysql => Box::new(MysqlUpsertGenerator),
        SqlDialect::MysqlLegacy => Box::new(MysqlLegacyUpsertGenerator),
    }
}

// ============================================================================
// Dialect Selection
// ============================================================================

/// First MySQL release supporting the `INSERT ... AS alias` row alias.
pub const ROW_ALIAS_MIN_VERSION: ServerVersion = ServerVersion::new(8, 0, 19);

/// A `(major, minor, patch)` server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string such as `8.0.19`, `8.0.32-log` or `9.1`.
    ///
    /// Each of the first three dot-separated segments contributes its
    /// leading digits; absent segments count as zero. Returns `None` when a
    /// present segment has no leading digits.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = [0_u32; 3];
        for (slot, segment) in parts.iter_mut().zip(version.trim().split('.')) {
            let digits: &str = segment
                .find(|c: char| !c.is_ascii_digit())
                .map_or(segment, |end| &segment[..end]);
            *slot = digits.parse().ok()?;
        }
        Some(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Choose a dialect from a connection's reported product name and version.
///
/// The product name selects the family by case-insensitive substring. Within
/// MySQL, versions below [`ROW_ALIAS_MIN_VERSION`] get the legacy syntax; an
/// unparseable version assumes a modern server.
pub fn resolve_dialect(product_name: &str, version: &str) -> Result<SqlDialect> {
    let product = product_name.to_ascii_lowercase();

    if product.contains("postgres") {
        return Ok(SqlDialect::Postgres);
    }

    if product.contains("mysql") {
        let dialect = match ServerVersion::parse(version) {
            Some(v) if v < ROW_ALIAS_MIN_VERSION => SqlDialect::MysqlLegacy,
            Some(_) => SqlDialect::Mysql,
            None => {
                tracing::warn!(
                    product = product_name,
                    version = version,
                    "Could not parse server version, assuming row alias support"
                );
                SqlDialect::Mysql
            }
        };
        tracing::debug!(product = product_name, version = version, dialect = %dialect, "Resolved dialect");
        return Ok(dialect);
    }

    Err(UnsupportedDatabaseError {
        product_name: product_name.to_string(),
        version: version.to_string(),
    }
    .into())
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// How a dialect refers to the incoming and stored rows.
trait ConflictSyntax {
    /// Value the conflicting insert tried to write.
    fn incoming(&self, column: &str) -> String;

    /// Value currently stored.
    fn existing(&self, table: &str, column: &str) -> String;

    /// Pick `then` when `condition` holds, otherwise `otherwise`.
    fn choose(&self, condition: &str, then: &str, otherwise: &str) -> String;
}

/// Named placeholder for `column` in row `row` (1-based).
pub fn named_placeholder(column: &ColumnDescriptor, row: usize) -> String {
    format!(":{}_{row}", column.field_name)
}

/// `INSERT INTO t (a, b) VALUES (:a_1, :b_1), (:a_2, :b_2)`
fn insert_prefix(plan: &QueryPlan, batch_size: usize) -> String {
    let columns = plan
        .value_columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let tuples = (1..=batch_size.max(1))
        .map(|row| {
            let placeholders = plan
                .value_columns()
                .iter()
                .map(|c| named_placeholder(c, row))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({columns}) VALUES {tuples}",
        plan.table_name()
    )
}

/// Comma-separated column list of the ON columns.
fn on_column_list(plan: &QueryPlan) -> String {
    plan.on_columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the assignment list of the conflict clause.
fn update_assignments(plan: &QueryPlan, syntax: &dyn ConflictSyntax) -> String {
    let table = plan.table_name();

    if plan.update_columns().is_empty() {
        // Some engines reject a conflict clause without assignments.
        return match plan.on_columns().first() {
            Some(key) => format!("{} = {}", key.name, syntax.existing(table, &key.name)),
            None => "1=1".to_string(),
        };
    }

    let condition = plan.predicate().map(|p| {
        format!(
            "{} {} {}",
            syntax.incoming(&p.column.name),
            p.operator().as_sql(),
            syntax.existing(table, &p.column.name)
        )
    });

    plan.ordered_update_columns()
        .into_iter()
        .map(|column| {
            let incoming = syntax.incoming(&column.name);
            let value = match &condition {
                Some(condition) => {
                    syntax.choose(condition, &incoming, &syntax.existing(table, &column.name))
                }
                None => incoming,
            };
            format!("{} = {value}", column.name)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_generated(dialect: SqlDialect, plan: &QueryPlan, batch_size: usize, sql: &str) {
    tracing::debug!(
        dialect = %dialect,
        table = plan.table_name(),
        batch_size = batch_size,
        "Generated upsert SQL"
    );
    tracing::trace!(sql = sql, "Upsert SQL text");
}
