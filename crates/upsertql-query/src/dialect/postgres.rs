//! PostgreSQL upsert generator.

use super::{
    ConflictSyntax, SqlDialect, UpsertSqlGenerator, insert_prefix, log_generated, on_column_list,
    update_assignments,
};
use crate::plan::QueryPlan;

/// `INSERT ... ON CONFLICT (...) DO UPDATE SET col = EXCLUDED.col`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresUpsertGenerator;

impl ConflictSyntax for PostgresUpsertGenerator {
    fn incoming(&self, column: &str) -> String {
        format!("EXCLUDED.{column}")
    }

    fn existing(&self, table: &str, column: &str) -> String {
        format!("{table}.{column}")
    }

    fn choose(&self, condition: &str, then: &str, otherwise: &str) -> String {
        format!("CASE WHEN {condition} THEN {then} ELSE {otherwise} END")
    }
}

impl UpsertSqlGenerator for PostgresUpsertGenerator {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn generate_batch_upsert_sql(&self, plan: &QueryPlan, batch_size: usize) -> String {
        let sql = format!(
            "{} ON CONFLICT ({}) DO UPDATE SET {}",
            insert_prefix(plan, batch_size),
            on_column_list(plan),
            update_assignments(plan, self)
        );
        log_generated(self.dialect(), plan, batch_size, &sql);
        sql
    }

    fn supports_optimized_batch(&self) -> bool {
        true
    }
}
