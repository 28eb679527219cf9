//! Statement caching for generated upsert SQL.
//!
//! Generated SQL depends only on the plan, the dialect and the batch size,
//! so it is built once per key and shared afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use upsertql_core::SharedCache;

use crate::dialect::{SqlDialect, UpsertSqlGenerator};
use crate::plan::QueryPlan;

/// Cache key for a generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    pub plan: QueryPlan,
    pub dialect: SqlDialect,
    pub batch_size: usize,
}

/// Concurrency-safe cache of generated SQL.
///
/// # Example
///
/// ```
/// use upsertql_core::{ColumnDescriptor, EntityMetadata};
/// use upsertql_query::cache::StatementCache;
/// use upsertql_query::dialect::PostgresUpsertGenerator;
/// use upsertql_query::plan::QueryPlan;
///
/// let meta = EntityMetadata::builder("tags")
///     .column(ColumnDescriptor::of::<i64>("id", "id"))
///     .column(ColumnDescriptor::of::<String>("label", "label"))
///     .id("id")
///     .build()
///     .unwrap();
/// let plan = QueryPlan::builder(&meta).build().unwrap();
///
/// let cache = StatementCache::new();
/// let first = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 3);
/// let second = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 3);
/// assert_eq!(first, second);
/// assert_eq!(cache.hits(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StatementCache {
    statements: SharedCache<StatementKey, String>,
    hits: AtomicU64,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached statement or generate and insert it.
    pub fn get_or_generate(
        &self,
        generator: &dyn UpsertSqlGenerator,
        plan: &QueryPlan,
        batch_size: usize,
    ) -> Arc<String> {
        let key = StatementKey {
            plan: plan.clone(),
            dialect: generator.dialect(),
            batch_size: batch_size.max(1),
        };
        if let Some(sql) = self.statements.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return sql;
        }
        self.statements
            .get_or_insert_with(key, || generator.generate_batch_upsert_sql(plan, batch_size))
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn clear(&self) {
        self.statements.clear();
        self.hits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MysqlUpsertGenerator, PostgresUpsertGenerator};
    use upsertql_core::{ColumnDescriptor, EntityMetadata};

    fn plan() -> QueryPlan {
        let meta = EntityMetadata::builder("tags")
            .column(ColumnDescriptor::of::<i64>("id", "id"))
            .column(ColumnDescriptor::of::<String>("label", "label"))
            .id("id")
            .build()
            .unwrap();
        QueryPlan::builder(&meta).build().unwrap()
    }

    #[test]
    fn test_keys_separate_dialect_and_batch_size() {
        let cache = StatementCache::new();
        let plan = plan();
        let pg = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 2);
        let my = cache.get_or_generate(&MysqlUpsertGenerator, &plan, 2);
        let pg_one = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 1);
        assert_ne!(pg, my);
        assert_ne!(pg, pg_one);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_hit_returns_shared_entry() {
        let cache = StatementCache::new();
        let plan = plan();
        let a = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 2);
        let b = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.hits(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_zero_batch_shares_single_row_entry() {
        let cache = StatementCache::new();
        let plan = plan();
        let zero = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 0);
        let one = cache.get_or_generate(&PostgresUpsertGenerator, &plan, 1);
        assert!(Arc::ptr_eq(&zero, &one));
    }
}
