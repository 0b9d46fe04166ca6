//! Resolution of source fields to destination columns.

use std::collections::HashSet;

use postgres::schema::{ColumnSchema, TableSchema};
use tracing::debug;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::source::RowShape;

/// Association of a source field with a destination column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnMapping {
    pub source_field: String,
    pub column: String,
}

impl ColumnMapping {
    pub fn new(source_field: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            column: column.into(),
        }
    }
}

impl<S, C> From<(S, C)> for ColumnMapping
where
    S: Into<String>,
    C: Into<String>,
{
    fn from((source_field, column): (S, C)) -> Self {
        ColumnMapping::new(source_field, column)
    }
}

/// A mapping validated against the destination metadata.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedMapping {
    /// Field name as it appears in the rows.
    pub(crate) source_field: String,
    pub(crate) column: ColumnSchema,
}

/// Resolves the mappings of an operation.
///
/// Explicit mappings are validated one by one. Without explicit mappings, every field of the
/// row shape whose name matches a destination column ignoring case is mapped and the remaining
/// fields are dropped. All failures are [`ErrorKind::SchemaMismatch`] and happen before any
/// data is transferred.
pub(crate) fn resolve_mappings(
    explicit: Option<&[ColumnMapping]>,
    shape: &RowShape,
    schema: &TableSchema,
) -> BulkResult<Vec<ResolvedMapping>> {
    let resolved = match explicit {
        Some(mappings) if !mappings.is_empty() => resolve_explicit(mappings, shape, schema)?,
        _ => resolve_implicit(shape, schema)?,
    };

    if resolved.is_empty() {
        bail!(
            ErrorKind::SchemaMismatch,
            "No source field matches a destination column",
            format!(
                "None of the fields {:?} exists in table {}",
                shape
                    .fields()
                    .iter()
                    .map(|field| field.name.as_str())
                    .collect::<Vec<_>>(),
                schema.name
            )
        );
    }

    for mapping in &resolved {
        check_compatibility(mapping, shape, schema)?;
    }

    debug!(
        table = %schema.name,
        columns = resolved.len(),
        "resolved column mappings"
    );

    Ok(resolved)
}

fn resolve_explicit(
    mappings: &[ColumnMapping],
    shape: &RowShape,
    schema: &TableSchema,
) -> BulkResult<Vec<ResolvedMapping>> {
    let mut seen_columns = HashSet::new();
    let mut resolved = Vec::with_capacity(mappings.len());

    for mapping in mappings {
        let Some(column) = schema.column(&mapping.column) else {
            bail!(
                ErrorKind::SchemaMismatch,
                "Destination column does not exist",
                format!(
                    "Column '{}' mapped from field '{}' does not exist in table {}",
                    mapping.column, mapping.source_field, schema.name
                )
            );
        };

        let Some(field) = shape.field(&mapping.source_field) else {
            bail!(
                ErrorKind::SchemaMismatch,
                "Source field does not exist",
                format!(
                    "Field '{}' mapped to column '{}' is not present in the rows",
                    mapping.source_field, mapping.column
                )
            );
        };

        if !seen_columns.insert(column.name.clone()) {
            bail!(
                ErrorKind::SchemaMismatch,
                "Destination column is mapped more than once",
                format!(
                    "Column '{}' of table {} is the target of multiple mappings",
                    column.name, schema.name
                )
            );
        }

        resolved.push(ResolvedMapping {
            source_field: field.name.clone(),
            column: column.clone(),
        });
    }

    Ok(resolved)
}

fn resolve_implicit(shape: &RowShape, schema: &TableSchema) -> BulkResult<Vec<ResolvedMapping>> {
    let mut seen_columns = HashSet::new();
    let mut resolved = Vec::new();

    for field in shape.fields() {
        let Some(column) = schema.column(&field.name) else {
            continue;
        };

        if !seen_columns.insert(column.name.clone()) {
            debug!(
                field = %field.name,
                column = %column.name,
                "skipping field matching an already mapped column"
            );
            continue;
        }

        resolved.push(ResolvedMapping {
            source_field: field.name.clone(),
            column: column.clone(),
        });
    }

    Ok(resolved)
}

fn check_compatibility(
    mapping: &ResolvedMapping,
    shape: &RowShape,
    schema: &TableSchema,
) -> BulkResult<()> {
    let sample = shape
        .field(&mapping.source_field)
        .and_then(|field| field.sample.as_ref());

    if let Some(sample) = sample
        && !sample.is_compatible_with(&mapping.column.typ)
    {
        bail!(
            ErrorKind::SchemaMismatch,
            "Source field type is incompatible with the destination column",
            format!(
                "Field '{}' holds {} values which cannot be stored in column '{}' of type {} in table {}",
                mapping.source_field,
                sample.kind_name(),
                mapping.column.name,
                mapping.column.typ,
                schema.name
            )
        );
    }

    if let Some(sample) = sample
        && let Err(err) = sample.coerce_to(&mapping.column.typ)
    {
        bail!(
            ErrorKind::SchemaMismatch,
            "Source field value cannot be converted to the destination column type",
            format!(
                "Field '{}' holds a {} value which cannot be converted to column '{}' of type {} in table {}",
                mapping.source_field,
                sample.kind_name(),
                mapping.column.name,
                mapping.column.typ,
                schema.name
            ),
            source: err
        );
    }

    Ok(())
}
