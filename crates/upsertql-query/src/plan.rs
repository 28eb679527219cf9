//! Validated upsert query plans.
//!
//! A [`QueryPlan`] combines an entity's metadata with the requested ON,
//! value, update and ignored columns. Building one checks every relational
//! invariant up front so dialect generators never see an inconsistent plan:
//!
//! 1. requested ON columns exist;
//! 2. ON columns are id or unique columns;
//! 3. requested value columns exist;
//! 4. requested update and ignored columns exist;
//! 5. no update column is an ON column.
//!
//! All violations are reported together, each naming its columns.

use upsertql_core::{
    ColumnDescriptor, EntityMetadataProvider, Result, ValidationError, ValidationErrorKind,
};

use crate::intent::{ComparisonOperator, ConditionalPredicate, OperationIntent};

/// A conditional predicate resolved against the entity's columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanPredicate {
    /// The predicate as requested (entity field name)
    pub predicate: ConditionalPredicate,
    /// The column the field maps to
    pub column: ColumnDescriptor,
}

impl PlanPredicate {
    pub fn operator(&self) -> ComparisonOperator {
        self.predicate.operator
    }
}

/// What the caller asked for, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlanRequest {
    pub on_fields: Vec<String>,
    pub value_fields: Vec<String>,
    pub update_fields: Option<Vec<String>>,
    pub ignore_fields: Vec<String>,
    pub ignore_all: bool,
    pub predicate: Option<ConditionalPredicate>,
    pub unmatched_condition: Option<String>,
    pub strict_conditions: bool,
    pub excluded_value_fields: Vec<String>,
}

/// Immutable, validated upsert plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPlan {
    table_name: String,
    on_columns: Vec<ColumnDescriptor>,
    value_columns: Vec<ColumnDescriptor>,
    update_columns: Vec<ColumnDescriptor>,
    predicate: Option<PlanPredicate>,
    request: PlanRequest,
}

impl QueryPlan {
    /// Start a plan for an entity.
    pub fn builder<M: EntityMetadataProvider + ?Sized>(metadata: &M) -> QueryPlanBuilder<'_, M> {
        QueryPlanBuilder {
            metadata,
            request: PlanRequest {
                strict_conditions: true,
                ..PlanRequest::default()
            },
        }
    }

    /// Start a plan from a parsed operation intent.
    pub fn from_intent<'a, M: EntityMetadataProvider + ?Sized>(
        metadata: &'a M,
        intent: &OperationIntent,
    ) -> QueryPlanBuilder<'a, M> {
        let mut builder = Self::builder(metadata)
            .on_fields(intent.on_fields.iter().cloned())
            .ignore_fields(intent.ignored_fields.iter().cloned())
            .ignore_all(intent.ignore_all_fields);
        if let Some(predicate) = &intent.predicate {
            builder = builder.predicate(predicate.clone());
        }
        builder.request.unmatched_condition = intent.unmatched_condition.clone();
        builder
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn on_columns(&self) -> &[ColumnDescriptor] {
        &self.on_columns
    }

    pub fn value_columns(&self) -> &[ColumnDescriptor] {
        &self.value_columns
    }

    pub fn update_columns(&self) -> &[ColumnDescriptor] {
        &self.update_columns
    }

    pub fn predicate(&self) -> Option<&PlanPredicate> {
        self.predicate.as_ref()
    }

    /// The request this plan was built from.
    pub fn request(&self) -> &PlanRequest {
        &self.request
    }

    /// Update columns in emission order.
    ///
    /// When a predicate column is itself updated it must be assigned last:
    /// engines that apply assignments left to right would otherwise compare
    /// later columns against the already-rewritten value.
    pub fn ordered_update_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut ordered: Vec<&ColumnDescriptor> = self.update_columns.iter().collect();
        if let Some(predicate) = &self.predicate {
            if let Some(pos) = ordered.iter().position(|c| **c == predicate.column) {
                let column = ordered.remove(pos);
                ordered.push(column);
            }
        }
        ordered
    }

    /// Rebuild this plan with the entity's first unique-constraint group as
    /// the ON columns.
    pub fn for_first_unique_constraint<M: EntityMetadataProvider + ?Sized>(
        &self,
        metadata: &M,
    ) -> Result<QueryPlan> {
        build_on_first_unique_constraint(metadata, self.request.clone())
    }

    /// A copy of this plan that no longer inserts the given columns.
    ///
    /// Removed columns are also dropped from the update set, since there is
    /// no incoming value to assign from. ON columns are kept.
    pub fn without_value_columns(&self, excluded: &[&str]) -> QueryPlan {
        let keep = |c: &&ColumnDescriptor| !excluded.iter().any(|name| c.matches(name));
        let mut plan = self.clone();
        plan.value_columns = self.value_columns.iter().filter(keep).cloned().collect();
        plan.update_columns = self.update_columns.iter().filter(keep).cloned().collect();
        plan.request
            .excluded_value_fields
            .extend(excluded.iter().map(|s| (*s).to_string()));
        plan
    }
}

/// Builder for [`QueryPlan`]. Every list defaults as described on each setter.
pub struct QueryPlanBuilder<'a, M: EntityMetadataProvider + ?Sized> {
    metadata: &'a M,
    request: PlanRequest,
}

impl<'a, M: EntityMetadataProvider + ?Sized> QueryPlanBuilder<'a, M> {
    /// ON columns. Default: the id column(s).
    pub fn on_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.on_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Inserted columns. Default: every entity column.
    pub fn value_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.value_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Explicit update columns. Default: value columns minus ON and ignored columns.
    pub fn update_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.update_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Columns excluded from the update branch.
    pub fn ignore_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.ignore_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Make the update branch a no-op.
    pub fn ignore_all(mut self, value: bool) -> Self {
        self.request.ignore_all = value;
        self
    }

    /// Gate the update branch on a comparison with the stored row.
    pub fn predicate(mut self, predicate: ConditionalPredicate) -> Self {
        self.request.predicate = Some(predicate);
        self
    }

    /// Reject intents whose `When` clause had no recognizable operator.
    pub fn strict_conditions(mut self, value: bool) -> Self {
        self.request.strict_conditions = value;
        self
    }

    /// Validate and build the plan.
    pub fn build(self) -> Result<QueryPlan> {
        build(self.metadata, self.request)
    }

    /// Validate and build the plan with the first unique-constraint group as
    /// the ON columns, whatever ON columns were requested.
    pub fn build_on_first_unique_constraint(self) -> Result<QueryPlan> {
        build_on_first_unique_constraint(self.metadata, self.request)
    }
}

fn build_on_first_unique_constraint<M: EntityMetadataProvider + ?Sized>(
    metadata: &M,
    mut request: PlanRequest,
) -> Result<QueryPlan> {
    let Some(group) = metadata.unique_constraints().first() else {
        let mut errors = ValidationError::new(metadata.table_name());
        errors.add(
            ValidationErrorKind::NoUniqueConstraint,
            Vec::<String>::new(),
            "entity declares no unique constraint to upsert on",
        );
        return Err(errors.into());
    };
    request.on_fields = group.iter().map(|c| c.name.clone()).collect();
    build(metadata, request)
}

fn build<M: EntityMetadataProvider + ?Sized>(metadata: &M, request: PlanRequest) -> Result<QueryPlan> {
    let table = metadata.table_name();
    let mut errors = ValidationError::new(table);

    // ON columns
    let on_columns = if request.on_fields.is_empty() {
        metadata.id_columns().to_vec()
    } else {
        let (found, missing) = resolve(metadata, &request.on_fields);
        if !missing.is_empty() {
            errors.add(
                ValidationErrorKind::UnknownOnColumn,
                missing,
                "ON columns must be entity columns",
            );
        }
        found
    };

    if on_columns.is_empty() && !errors.has(ValidationErrorKind::UnknownOnColumn) {
        errors.add(
            ValidationErrorKind::MissingOnColumns,
            Vec::<String>::new(),
            "entity has no id column and no ON columns were requested",
        );
    }

    let not_unique: Vec<String> = on_columns
        .iter()
        .filter(|c| !metadata.id_columns().contains(c) && !metadata.unique_columns().contains(c))
        .map(|c| c.name.clone())
        .collect();
    if !not_unique.is_empty() {
        errors.add(
            ValidationErrorKind::NonUniqueOnColumn,
            not_unique,
            "ON columns must be part of the primary key or a unique constraint",
        );
    }

    // Value columns
    let mut value_columns = if request.value_fields.is_empty() {
        metadata.columns().to_vec()
    } else {
        let (found, missing) = resolve(metadata, &request.value_fields);
        if !missing.is_empty() {
            errors.add(
                ValidationErrorKind::UnknownValueColumn,
                missing,
                "value columns must be entity columns",
            );
        }
        found
    };
    value_columns.retain(|c| {
        !request
            .excluded_value_fields
            .iter()
            .any(|name| c.matches(name))
    });

    // Update columns
    let (ignored, missing_ignored) = resolve(metadata, &request.ignore_fields);
    if !missing_ignored.is_empty() {
        errors.add(
            ValidationErrorKind::UnknownUpdateColumn,
            missing_ignored,
            "ignored columns must be entity columns",
        );
    }

    let update_columns = if let Some(update_fields) = &request.update_fields {
        let (found, missing) = resolve(metadata, update_fields);
        if !missing.is_empty() {
            errors.add(
                ValidationErrorKind::UnknownUpdateColumn,
                missing,
                "update columns must be entity columns",
            );
        }
        let overlapping: Vec<String> = found
            .iter()
            .filter(|c| on_columns.contains(c))
            .map(|c| c.name.clone())
            .collect();
        if !overlapping.is_empty() {
            errors.add(
                ValidationErrorKind::OnColumnUpdated,
                overlapping,
                "a column used to detect the conflict cannot also be updated",
            );
        }
        found
            .into_iter()
            .filter(|c| !ignored.contains(c))
            .collect()
    } else if request.ignore_all {
        Vec::new()
    } else {
        value_columns
            .iter()
            .filter(|c| !on_columns.contains(c) && !ignored.contains(c))
            .cloned()
            .collect()
    };

    // Predicate
    let predicate = match &request.predicate {
        Some(predicate) => {
            let column = metadata
                .columns()
                .iter()
                .find(|c| c.field_name == predicate.field_name)
                .or_else(|| metadata.find_column(&predicate.field_name));
            match column {
                Some(column) => Some(PlanPredicate {
                    predicate: predicate.clone(),
                    column: column.clone(),
                }),
                None => {
                    errors.add(
                        ValidationErrorKind::UnknownPredicateField,
                        [predicate.field_name.clone()],
                        "conditional field is not an entity field",
                    );
                    None
                }
            }
        }
        None => None,
    };

    if request.strict_conditions {
        if let Some(condition) = &request.unmatched_condition {
            errors.add(
                ValidationErrorKind::UnrecognizedCondition,
                [condition.clone()],
                "When clause must end in More, MoreOrEqual, Less or LessOrEqual",
            );
        }
    }

    errors.into_result()?;

    let plan = QueryPlan {
        table_name: table.to_string(),
        on_columns,
        value_columns,
        update_columns,
        predicate,
        request,
    };

    tracing::debug!(
        table = %plan.table_name,
        on = plan.on_columns.len(),
        values = plan.value_columns.len(),
        updates = plan.update_columns.len(),
        conditional = plan.predicate.is_some(),
        "Built upsert plan"
    );

    Ok(plan)
}

/// Resolve names to columns, preserving order and dropping duplicates.
fn resolve<M: EntityMetadataProvider + ?Sized>(
    metadata: &M,
    names: &[String],
) -> (Vec<ColumnDescriptor>, Vec<String>) {
    let mut found: Vec<ColumnDescriptor> = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match metadata.find_column(name) {
            Some(column) => {
                if !found.contains(column) {
                    found.push(column.clone());
                }
            }
            None => missing.push(name.clone()),
        }
    }
    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::parse;
    use upsertql_core::{EntityMetadata, Error};

    fn accounts() -> EntityMetadata {
        EntityMetadata::builder("accounts")
            .column(ColumnDescriptor::of::<i64>("id", "id").generated(true))
            .column(ColumnDescriptor::of::<String>("email", "email"))
            .column(ColumnDescriptor::of::<String>("name", "name"))
            .column(ColumnDescriptor::of::<i64>("version", "version"))
            .column(ColumnDescriptor::of::<String>("created_by", "createdBy"))
            .id("id")
            .unique("email")
            .build()
            .unwrap()
    }

    fn names(columns: &[ColumnDescriptor]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn violations(err: Error) -> ValidationError {
        match err {
            Error::Validation(v) => v,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_defaults_use_primary_key() {
        let meta = accounts();
        let plan = QueryPlan::builder(&meta).build().unwrap();
        assert_eq!(plan.table_name(), "accounts");
        assert_eq!(names(plan.on_columns()), vec!["id"]);
        assert_eq!(
            names(plan.value_columns()),
            vec!["id", "email", "name", "version", "created_by"]
        );
        assert_eq!(
            names(plan.update_columns()),
            vec!["email", "name", "version", "created_by"]
        );
        assert!(plan.predicate().is_none());
    }

    #[test]
    fn test_from_intent() {
        let meta = accounts();
        let intent = parse("upsertAllOnEmailWhenVersionMoreIgnoringCreatedBy").unwrap();
        let plan = QueryPlan::from_intent(&meta, &intent).build().unwrap();
        assert_eq!(names(plan.on_columns()), vec!["email"]);
        assert_eq!(names(plan.update_columns()), vec!["id", "name", "version"]);
        let predicate = plan.predicate().unwrap();
        assert_eq!(predicate.column.name, "version");
        assert_eq!(predicate.operator(), ComparisonOperator::Greater);
    }

    #[test]
    fn test_ignore_all_yields_no_updates() {
        let meta = accounts();
        let intent = parse("upsertOnEmailIgnoringAllFields").unwrap();
        let plan = QueryPlan::from_intent(&meta, &intent).build().unwrap();
        assert!(plan.update_columns().is_empty());
        assert_eq!(plan.value_columns().len(), 5);
    }

    #[test]
    fn test_non_unique_on_column_is_rejected() {
        let meta = accounts();
        let err = QueryPlan::builder(&meta)
            .on_fields(["name", "email"])
            .build()
            .unwrap_err();
        assert!(err.is_configuration_error());
        let v = violations(err);
        assert_eq!(v.columns_for(ValidationErrorKind::NonUniqueOnColumn), vec!["name"]);
    }

    #[test]
    fn test_all_violations_reported_together() {
        let meta = accounts();
        let err = QueryPlan::builder(&meta)
            .on_fields(["ghost"])
            .value_fields(["id", "phantom"])
            .update_fields(["id", "wraith"])
            .build()
            .unwrap_err();
        let v = violations(err);
        assert_eq!(v.columns_for(ValidationErrorKind::UnknownOnColumn), vec!["ghost"]);
        assert_eq!(v.columns_for(ValidationErrorKind::UnknownValueColumn), vec!["phantom"]);
        assert_eq!(v.columns_for(ValidationErrorKind::UnknownUpdateColumn), vec!["wraith"]);
        // "id" is not an ON column here since ON failed to resolve
        assert!(!v.has(ValidationErrorKind::OnColumnUpdated));
    }

    #[test]
    fn test_update_column_overlapping_on_is_rejected() {
        let meta = accounts();
        let err = QueryPlan::builder(&meta)
            .on_fields(["email"])
            .update_fields(["name", "email"])
            .build()
            .unwrap_err();
        assert_eq!(
            violations(err).columns_for(ValidationErrorKind::OnColumnUpdated),
            vec!["email"]
        );
    }

    #[test]
    fn test_unknown_ignored_and_predicate_fields() {
        let meta = accounts();
        let err = QueryPlan::builder(&meta)
            .ignore_fields(["nope"])
            .predicate(ConditionalPredicate::new("revision", ComparisonOperator::Greater))
            .build()
            .unwrap_err();
        let v = violations(err);
        assert!(v.has(ValidationErrorKind::UnknownUpdateColumn));
        assert_eq!(
            v.columns_for(ValidationErrorKind::UnknownPredicateField),
            vec!["revision"]
        );
    }

    #[test]
    fn test_unmatched_condition_strict_and_lenient() {
        let meta = accounts();
        let intent = parse("upsertOnEmailWhenVersionBigger").unwrap();

        let err = QueryPlan::from_intent(&meta, &intent).build().unwrap_err();
        assert!(violations(err).has(ValidationErrorKind::UnrecognizedCondition));

        let plan = QueryPlan::from_intent(&meta, &intent)
            .strict_conditions(false)
            .build()
            .unwrap();
        assert!(plan.predicate().is_none());
    }

    #[test]
    fn test_missing_id_requires_on_columns() {
        let meta = EntityMetadata::builder("events")
            .column(ColumnDescriptor::of::<String>("code", "code"))
            .unique("code")
            .build()
            .unwrap();
        let err = QueryPlan::builder(&meta).build().unwrap_err();
        assert!(violations(err).has(ValidationErrorKind::MissingOnColumns));
    }

    #[test]
    fn test_plan_building_is_idempotent() {
        let meta = accounts();
        let intent = parse("upsertAllOnEmailWhenVersionMoreOrEqual").unwrap();
        let a = QueryPlan::from_intent(&meta, &intent).build().unwrap();
        let b = QueryPlan::from_intent(&meta, &intent).build().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invariants_hold_for_many_intents() {
        let meta = accounts();
        for name in [
            "upsert",
            "upsertAllOnEmail",
            "upsertOnIdIgnoringName",
            "upsertAllOnEmailWhenVersionLess",
            "upsertOnEmailIgnoringAllFields",
            "upsertOnIdAndEmail",
        ] {
            let intent = parse(name).unwrap();
            let plan = QueryPlan::from_intent(&meta, &intent).build().unwrap();
            for column in plan.update_columns() {
                assert!(!plan.on_columns().contains(column), "{name}: {column:?}");
            }
            for column in plan
                .on_columns()
                .iter()
                .chain(plan.value_columns())
                .chain(plan.update_columns())
            {
                assert!(meta.columns().contains(column), "{name}: {column:?}");
            }
        }
    }

    #[test]
    fn test_predicate_column_ordered_last() {
        let meta = accounts();
        let plan = QueryPlan::builder(&meta)
            .on_fields(["email"])
            .update_fields(["version", "name"])
            .predicate(ConditionalPredicate::new(
                "version",
                ComparisonOperator::GreaterOrEqual,
            ))
            .build()
            .unwrap();
        let ordered: Vec<_> = plan
            .ordered_update_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(ordered, vec!["name", "version"]);
    }

    #[test]
    fn test_for_first_unique_constraint() {
        let meta = accounts();
        let plan = QueryPlan::builder(&meta).build().unwrap();
        let by_email = plan.for_first_unique_constraint(&meta).unwrap();
        assert_eq!(names(by_email.on_columns()), vec!["email"]);
        assert!(names(by_email.update_columns()).contains(&"id"));

        let bare = EntityMetadata::builder("bare")
            .column(ColumnDescriptor::of::<i64>("id", "id"))
            .id("id")
            .build()
            .unwrap();
        let plan = QueryPlan::builder(&bare).build().unwrap();
        let err = plan.for_first_unique_constraint(&bare).unwrap_err();
        assert!(violations(err).has(ValidationErrorKind::NoUniqueConstraint));
    }

    #[test]
    fn test_without_value_columns() {
        let meta = accounts();
        let plan = QueryPlan::builder(&meta)
            .on_fields(["email"])
            .build()
            .unwrap();
        let trimmed = plan.without_value_columns(&["id"]);
        assert_eq!(
            names(trimmed.value_columns()),
            vec!["email", "name", "version", "created_by"]
        );
        assert!(!names(trimmed.update_columns()).contains(&"id"));
        assert_eq!(names(trimmed.on_columns()), vec!["email"]);
    }
}
