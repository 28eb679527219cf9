//! Entity metadata: table, columns, keys and unique constraints.

use crate::column::ColumnDescriptor;
use crate::error::{ValidationError, ValidationErrorKind};

/// Read-only view of one entity type's mapping.
///
/// Implemented by [`EntityMetadata`]; external metamodels can implement it
/// directly if they already hold the information.
pub trait EntityMetadataProvider {
    /// The database table name.
    fn table_name(&self) -> &str;

    /// All mapped columns, in declaration order.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Primary key column(s), in key order.
    fn id_columns(&self) -> &[ColumnDescriptor];

    /// Columns that individually or as part of a constraint are unique.
    fn unique_columns(&self) -> &[ColumnDescriptor];

    /// Declared unique-constraint groups, in declaration order.
    fn unique_constraints(&self) -> &[Vec<ColumnDescriptor>];

    /// The single id column, if the key is not composite.
    fn id_column(&self) -> Option<&ColumnDescriptor> {
        match self.id_columns() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// Find a column by SQL name, falling back to the field name.
    fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        let columns = self.columns();
        columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| columns.iter().find(|c| c.field_name == name))
    }

    /// Columns the database generates (auto-increment keys and the like).
    fn generated_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns().iter().filter(|c| c.generated).collect()
    }
}

/// Immutable metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    table_name: String,
    columns: Vec<ColumnDescriptor>,
    id_columns: Vec<ColumnDescriptor>,
    unique_columns: Vec<ColumnDescriptor>,
    unique_constraints: Vec<Vec<ColumnDescriptor>>,
}

impl EntityMetadata {
    /// Start describing the entity mapped to `table_name`.
    pub fn builder(table_name: impl Into<String>) -> EntityMetadataBuilder {
        EntityMetadataBuilder {
            table_name: table_name.into(),
            columns: Vec::new(),
            id_names: Vec::new(),
            unique_names: Vec::new(),
            constraint_names: Vec::new(),
        }
    }
}

impl EntityMetadataProvider for EntityMetadata {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn id_columns(&self) -> &[ColumnDescriptor] {
        &self.id_columns
    }

    fn unique_columns(&self) -> &[ColumnDescriptor] {
        &self.unique_columns
    }

    fn unique_constraints(&self) -> &[Vec<ColumnDescriptor>] {
        &self.unique_constraints
    }
}

/// Builder for [`EntityMetadata`].
///
/// Keys and constraints are declared by column or field name and resolved
/// against the declared columns in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct EntityMetadataBuilder {
    table_name: String,
    columns: Vec<ColumnDescriptor>,
    id_names: Vec<String>,
    unique_names: Vec<String>,
    constraint_names: Vec<Vec<String>>,
}

impl EntityMetadataBuilder {
    /// Add a column.
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare a primary key column. Call repeatedly for a composite key.
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.id_names.push(name.into());
        self
    }

    /// Declare a single-column unique constraint.
    pub fn unique(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.constraint_names.push(vec![name.clone()]);
        self.unique_names.push(name);
        self
    }

    /// Declare a (possibly multi-column) unique constraint group.
    pub fn unique_constraint<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &group {
            if !self.unique_names.contains(name) {
                self.unique_names.push(name.clone());
            }
        }
        self.constraint_names.push(group);
        self
    }

    /// Resolve keys and constraints against the declared columns.
    ///
    /// Fails when any key or constraint names a column that was not declared.
    pub fn build(self) -> Result<EntityMetadata, ValidationError> {
        let mut errors = ValidationError::new(self.table_name.clone());

        let resolve = |names: &[String], errors: &mut ValidationError| -> Vec<ColumnDescriptor> {
            let mut resolved = Vec::with_capacity(names.len());
            let mut missing = Vec::new();
            for name in names {
                match find(&self.columns, name) {
                    Some(col) if !resolved.contains(col) => resolved.push(col.clone()),
                    Some(_) => {}
                    None => missing.push(name.clone()),
                }
            }
            if !missing.is_empty() {
                errors.add(
                    ValidationErrorKind::InvalidMetadata,
                    missing,
                    "key or constraint references an undeclared column",
                );
            }
            resolved
        };

        let id_columns = resolve(&self.id_names, &mut errors);
        let unique_columns = resolve(&self.unique_names, &mut errors);
        let unique_constraints = self
            .constraint_names
            .iter()
            .map(|group| resolve(group, &mut errors))
            .collect();

        errors.into_result()?;

        Ok(EntityMetadata {
            table_name: self.table_name,
            columns: self.columns,
            id_columns,
            unique_columns,
            unique_constraints,
        })
    }
}

fn find<'a>(columns: &'a [ColumnDescriptor], name: &str) -> Option<&'a ColumnDescriptor> {
    columns
        .iter()
        .find(|c| c.name == name)
        .or_else(|| columns.iter().find(|c| c.field_name == name))
}
