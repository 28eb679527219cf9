//! Generated-key write-back.
//!
//! After a batch executes, the data-access layer hands back one row of
//! generated values per inserted entity. Drivers disagree on what they call
//! the generated column, so each lookup tries several spellings in order:
//! the column name, the field name, [`GENERATED_KEY_ALIASES`], and finally
//! the upper-cased column name. The aliases name the one auto-increment
//! value a driver reports, so they only resolve the key column: the id
//! column when it is generated, otherwise a lone generated column.

use upsertql_core::{ColumnDescriptor, Entity, EntityMetadataProvider, Result, Row, Value};

/// Driver-specific names for an auto-increment key.
pub const GENERATED_KEY_ALIASES: [&str; 2] = ["GENERATED_KEY", "insert_id"];

fn lookup<'r>(row: &'r Row, column: &ColumnDescriptor, is_key: bool) -> Option<&'r Value> {
    row.get_by_name(&column.name)
        .or_else(|| row.get_by_name(&column.field_name))
        .or_else(|| {
            if is_key {
                GENERATED_KEY_ALIASES.iter().find_map(|alias| row.get_by_name(alias))
            } else {
                None
            }
        })
        .or_else(|| row.get_by_name(&column.name.to_uppercase()))
        .filter(|value| !value.is_null())
}

/// The generated column a driver's anonymous key value belongs to.
fn key_column<'m, M>(metadata: &'m M, generated: &[&'m ColumnDescriptor]) -> Option<&'m str>
where
    M: EntityMetadataProvider + ?Sized,
{
    match metadata.id_column() {
        Some(id) if id.generated => Some(id.name.as_str()),
        _ => match generated {
            [single] => Some(single.name.as_str()),
            _ => None,
        },
    }
}

/// Write generated values into entities whose generated fields are unset.
///
/// Entities and rows are paired by position. Populated fields are never
/// overwritten. Returns the number of fields written.
pub fn apply_generated_keys<E, M>(metadata: &M, entities: &mut [E], rows: &[Row]) -> Result<usize>
where
    E: Entity,
    M: EntityMetadataProvider + ?Sized,
{
    let generated = metadata.generated_columns();
    if generated.is_empty() || rows.is_empty() {
        return Ok(0);
    }

    if rows.len() != entities.len() {
        tracing::debug!(
            table = metadata.table_name(),
            entities = entities.len(),
            rows = rows.len(),
            "Generated key row count differs from batch size; pairing by position"
        );
    }

    let key = key_column(metadata, &generated);
    let mut written = 0;
    for (entity, row) in entities.iter_mut().zip(rows) {
        for column in &generated {
            let unset = entity
                .field_value(&column.field_name)
                .is_none_or(|current| current.is_null());
            if !unset {
                continue;
            }
            let is_key = key == Some(column.name.as_str());
            if let Some(value) = lookup(row, column, is_key) {
                entity.set_field_value(&column.field_name, value.clone())?;
                written += 1;
            }
        }
    }

    tracing::debug!(table = metadata.table_name(), written = written, "Applied generated keys");
    Ok(written)
}
