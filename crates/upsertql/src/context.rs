//! The upsert composition root.
//!
//! [`UpsertContext`] owns everything that is built once and shared: the
//! resolved dialect and its generator, the type-mapping registry and the
//! metadata, plan and statement caches. One context serves any number of
//! entity types and threads.

use std::any::TypeId;
use std::sync::Arc;

use upsertql_bind::{
    BatchParameterSource, BatchParameters, TypeMappingRegistry, apply_generated_keys,
};
use upsertql_core::{
    ConfigError, Entity, EntityMetadata, EntityMetadataProvider, MetadataCache, Result,
    SharedCache,
};
use upsertql_query::{
    QueryPlan, SqlDialect, StatementCache, UpsertSqlGenerator, generator_for_dialect, parse,
};

use crate::config::UpsertConfig;
use crate::executor::BatchExecutor;

/// Drives operation name -> plan -> SQL -> parameters -> execution -> key write-back.
pub struct UpsertContext {
    config: UpsertConfig,
    dialect: SqlDialect,
    generator: Box<dyn UpsertSqlGenerator>,
    registry: TypeMappingRegistry,
    metadata: MetadataCache,
    plans: SharedCache<(TypeId, String), QueryPlan>,
    statements: StatementCache,
}

impl UpsertContext {
    /// Create a context with the built-in type mappers.
    pub fn new(config: UpsertConfig) -> Result<Self> {
        Self::with_registry(config, TypeMappingRegistry::default())
    }

    /// Create a context with a caller-supplied mapper chain.
    pub fn with_registry(config: UpsertConfig, registry: TypeMappingRegistry) -> Result<Self> {
        let dialect = config.dialect.resolve()?;
        tracing::info!(dialect = %dialect, "Upsert context ready");
        Ok(Self {
            generator: generator_for_dialect(dialect),
            dialect,
            config,
            registry,
            metadata: MetadataCache::new(),
            plans: SharedCache::new(),
            statements: StatementCache::new(),
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn config(&self) -> &UpsertConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeMappingRegistry {
        &self.registry
    }

    pub fn statement_cache(&self) -> &StatementCache {
        &self.statements
    }

    /// Cached metadata for `E`.
    pub fn metadata<E: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.metadata.get::<E>()
    }

    /// The validated plan for an operation on `E`.
    ///
    /// Entities without an id column upsert on their first unique
    /// constraint when the operation names no ON columns.
    pub fn plan<E: Entity>(&self, operation: &str) -> Result<Arc<QueryPlan>> {
        let key = (TypeId::of::<E>(), operation.to_string());
        self.plans.try_get_or_insert_with(key, || {
            let intent = parse(operation).ok_or_else(|| {
                ConfigError::new(format!("'{operation}' is not an upsert operation"))
            })?;
            let metadata = self.metadata.get::<E>()?;
            let builder = QueryPlan::from_intent(&*metadata, &intent)
                .strict_conditions(self.config.strict_conditions);
            if intent.on_fields.is_empty() && metadata.id_columns().is_empty() {
                builder.build_on_first_unique_constraint()
            } else {
                builder.build()
            }
        })
    }

    /// The SQL for an operation on `E` covering `batch_size` rows.
    pub fn prepare<E: Entity>(&self, operation: &str, batch_size: usize) -> Result<Arc<String>> {
        let plan = self.plan::<E>(operation)?;
        Ok(self.sql_for(&plan, batch_size))
    }

    fn sql_for(&self, plan: &QueryPlan, batch_size: usize) -> Arc<String> {
        self.statements
            .get_or_generate(&*self.generator, plan, batch_size)
    }

    /// Bind a batch against an operation's plan.
    pub fn bind<E: Entity>(&self, operation: &str, entities: &[E]) -> Result<BatchParameters> {
        let plan = self.plan::<E>(operation)?;
        BatchParameterSource::new(&self.registry).bind(&plan, entities)
    }

    /// Generated columns `entity` leaves for the database to fill.
    fn unset_generated<E: Entity>(&self, metadata: &EntityMetadata, entity: &E) -> Vec<String> {
        if !self.config.skip_unset_generated {
            return Vec::new();
        }
        metadata
            .generated_columns()
            .into_iter()
            .filter(|column| {
                entity
                    .field_value(&column.field_name)
                    .is_none_or(|value| value.is_null())
            })
            .map(|column| column.name.clone())
            .collect()
    }

    /// Split a batch into consecutive runs whose entities leave the same
    /// generated columns unset. Each run gets its own INSERT column list, so
    /// a populated key is never bound next to a NULL one.
    fn generated_runs<E: Entity>(
        &self,
        metadata: &EntityMetadata,
        entities: &[E],
    ) -> Vec<(usize, Vec<String>)> {
        let mut runs: Vec<(usize, Vec<String>)> = Vec::new();
        for entity in entities {
            let unset = self.unset_generated(metadata, entity);
            match runs.last_mut() {
                Some((len, last)) if *last == unset => *len += 1,
                _ => runs.push((1, unset)),
            }
        }
        runs
    }

    /// Upsert `entities` and write generated keys back.
    ///
    /// Entities run in order. Consecutive entities that leave the same
    /// generated columns unset share one statement when the dialect batches;
    /// otherwise every entity gets its own. Returns the affected row count
    /// reported by the executor. A failed statement fails the whole call.
    #[tracing::instrument(
        level = "debug",
        skip(self, executor, entities),
        fields(entity = std::any::type_name::<E>(), count = entities.len())
    )]
    pub fn upsert<E: Entity, X: BatchExecutor>(
        &self,
        executor: &mut X,
        operation: &str,
        entities: &mut [E],
    ) -> Result<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let metadata = self.metadata.get::<E>()?;
        let plan = self.plan::<E>(operation)?;
        let runs = self.generated_runs(&metadata, entities);
        let optimized = self.config.optimized_batch && self.generator.supports_optimized_batch();

        tracing::debug!(
            table = plan.table_name(),
            optimized = optimized,
            runs = runs.len(),
            "Executing upsert batch"
        );

        let mut affected = 0;
        let mut remaining = entities;
        for (len, unset) in runs {
            let (run, rest) = std::mem::take(&mut remaining).split_at_mut(len);
            remaining = rest;

            let run_plan = if unset.is_empty() {
                QueryPlan::clone(&plan)
            } else {
                let names: Vec<&str> = unset.iter().map(String::as_str).collect();
                plan.without_value_columns(&names)
            };
            affected += self.execute_run(executor, &run_plan, &metadata, run, optimized)?;
        }

        Ok(affected)
    }

    fn execute_run<E: Entity, X: BatchExecutor>(
        &self,
        executor: &mut X,
        plan: &QueryPlan,
        metadata: &EntityMetadata,
        entities: &mut [E],
        optimized: bool,
    ) -> Result<u64> {
        let source = BatchParameterSource::new(&self.registry);
        let chunk = if optimized { entities.len() } else { 1 };
        let sql = self.sql_for(plan, chunk);

        let mut affected = 0;
        for batch in entities.chunks_mut(chunk) {
            let params = source.bind(plan, batch)?;
            let statement = params.expand(&sql, self.dialect)?;
            let result = executor.execute(self.dialect, &statement)?;
            affected += result.affected;
            apply_generated_keys(metadata, batch, &result.generated_keys)?;
        }
        Ok(affected)
    }
}

impl std::fmt::Debug for UpsertContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsertContext")
            .field("dialect", &self.dialect)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("entities", &self.metadata.len())
            .field("plans", &self.plans.len())
            .field("statements", &self.statements.len())
            .finish()
    }
}
