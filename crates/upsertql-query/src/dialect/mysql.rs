//! MySQL upsert generators.
//!
//! MySQL 8.0.19 introduced a row alias for the inserted row
//! (`INSERT ... AS new_values`); older servers only offer the `VALUES(col)`
//! function, which 8.0.20 deprecates.

use super::{
    ConflictSyntax, SqlDialect, UpsertSqlGenerator, insert_prefix, log_generated,
    update_assignments,
};
use crate::plan::QueryPlan;

/// Alias given to the incoming row.
pub const ROW_ALIAS: &str = "new_values";

/// `INSERT ... AS new_values ON DUPLICATE KEY UPDATE col = new_values.col`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlUpsertGenerator;

/// `INSERT ... ON DUPLICATE KEY UPDATE col = VALUES(col)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlLegacyUpsertGenerator;

/// Stored values are referenced by bare column name in both variants.
fn stored(column: &str) -> String {
    column.to_string()
}

fn mysql_if(condition: &str, then: &str, otherwise: &str) -> String {
    format!("IF({condition}, {then}, {otherwise})")
}

impl ConflictSyntax for MysqlUpsertGenerator {
    fn incoming(&self, column: &str) -> String {
        format!("{ROW_ALIAS}.{column}")
    }

    fn existing(&self, _table: &str, column: &str) -> String {
        stored(column)
    }

    fn choose(&self, condition: &str, then: &str, otherwise: &str) -> String {
        mysql_if(condition, then, otherwise)
    }
}

impl UpsertSqlGenerator for MysqlUpsertGenerator {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Mysql
    }

    fn generate_batch_upsert_sql(&self, plan: &QueryPlan, batch_size: usize) -> String {
        let sql = format!(
            "{} AS {ROW_ALIAS} ON DUPLICATE KEY UPDATE {}",
            insert_prefix(plan, batch_size),
            update_assignments(plan, self)
        );
        log_generated(self.dialect(), plan, batch_size, &sql);
        sql
    }

    fn supports_optimized_batch(&self) -> bool {
        true
    }
}

impl ConflictSyntax for MysqlLegacyUpsertGenerator {
    fn incoming(&self, column: &str) -> String {
        format!("VALUES({column})")
    }

    fn existing(&self, _table: &str, column: &str) -> String {
        stored(column)
    }

    fn choose(&self, condition: &str, then: &str, otherwise: &str) -> String {
        mysql_if(condition, then, otherwise)
    }
}

impl UpsertSqlGenerator for MysqlLegacyUpsertGenerator {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MysqlLegacy
    }

    fn generate_batch_upsert_sql(&self, plan: &QueryPlan, batch_size: usize) -> String {
        if plan.predicate().is_some() && !plan.update_columns().is_empty() {
            tracing::warn!(
                table = plan.table_name(),
                columns = plan.update_columns().len(),
                "VALUES() in conditional updates is unreliable across multiple columns \
                 before MySQL 8.0.19; results may be inconsistent"
            );
        }
        let sql = format!(
            "{} ON DUPLICATE KEY UPDATE {}",
            insert_prefix(plan, batch_size),
            update_assignments(plan, self)
        );
        log_generated(self.dialect(), plan, batch_size, &sql);
        sql
    }

    fn supports_optimized_batch(&self) -> bool {
        false
    }
}
