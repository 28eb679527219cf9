//! Upsert planning and SQL generation for upsertql.
//!
//! - `intent`: operation-name parsing into an [`OperationIntent`]
//! - `plan`: validated [`QueryPlan`]s built from entity metadata
//! - `dialect`: per-database SQL generators and dialect selection
//! - `cache`: generated statement cache

pub mod cache;
pub mod dialect;
pub mod intent;
pub mod plan;

pub use cache::{StatementCache, StatementKey};
pub use dialect::{
    MysqlLegacyUpsertGenerator, MysqlUpsertGenerator, PostgresUpsertGenerator,
    ROW_ALIAS_MIN_VERSION, ServerVersion, SqlDialect, UpsertSqlGenerator, generator_for_dialect,
    named_placeholder, resolve_dialect,
};
pub use intent::{ComparisonOperator, ConditionalPredicate, OperationIntent, parse};
pub use plan::{PlanPredicate, PlanRequest, QueryPlan, QueryPlanBuilder};
