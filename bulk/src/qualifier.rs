//! Match predicates between staging and destination rows.

use postgres::schema::{ColumnSchema, TableSchema};

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::mapping::ResolvedMapping;

/// Alias of the destination relation in set-based statements.
pub(crate) const DESTINATION_ALIAS: &str = "d";

/// Alias of the staging relation in set-based statements.
pub(crate) const STAGING_ALIAS: &str = "s";

/// Ordered destination columns used to match staging rows against destination rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QualifierSet {
    columns: Vec<ColumnSchema>,
}

impl QualifierSet {
    /// Resolves the qualifier columns of a delete.
    ///
    /// Explicit qualifiers win, otherwise the primary key of the destination is used. Every
    /// qualifier must exist in the destination and be supplied by `mappings`.
    pub(crate) fn resolve(
        explicit: Option<&[String]>,
        schema: &TableSchema,
        mappings: &[ResolvedMapping],
    ) -> BulkResult<QualifierSet> {
        let mut columns: Vec<ColumnSchema> = Vec::new();

        match explicit {
            Some(names) if !names.is_empty() => {
                for name in names {
                    let Some(column) = schema.column(name) else {
                        bail!(
                            ErrorKind::SchemaMismatch,
                            "Qualifier column does not exist",
                            format!("Column '{name}' does not exist in table {}", schema.name)
                        );
                    };

                    if !columns.iter().any(|existing| existing.name == column.name) {
                        columns.push(column.clone());
                    }
                }
            }
            _ => {
                if !schema.has_primary_keys() {
                    bail!(
                        ErrorKind::SchemaMismatch,
                        "Destination has no primary key",
                        format!(
                            "Table {} has no primary key and no qualifier columns were given",
                            schema.name
                        )
                    );
                }

                columns.extend(schema.primary_key_columns().into_iter().cloned());
            }
        }

        for column in &columns {
            let mapped = mappings
                .iter()
                .any(|mapping| mapping.column.name == column.name);

            if !mapped {
                bail!(
                    ErrorKind::SchemaMismatch,
                    "Qualifier column is not supplied by the rows",
                    format!(
                        "Column '{}' of table {} is used to match rows but no source field maps to it",
                        column.name, schema.name
                    )
                );
            }
        }

        Ok(QualifierSet { columns })
    }

    pub(crate) fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Keeps only the mappings of qualifier columns, in qualifier order.
    pub(crate) fn project(&self, mappings: &[ResolvedMapping]) -> Vec<ResolvedMapping> {
        self.columns
            .iter()
            .filter_map(|column| {
                mappings
                    .iter()
                    .find(|mapping| mapping.column.name == column.name)
                    .cloned()
            })
            .collect()
    }

    /// Builds the equality predicate joining [`DESTINATION_ALIAS`] and [`STAGING_ALIAS`].
    ///
    /// Nullable columns compare with `is not distinct from` so that null keys match.
    pub(crate) fn predicate(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                let name = column.quoted_name();
                let operator = if column.nullable {
                    "is not distinct from"
                } else {
                    "="
                };

                format!("{DESTINATION_ALIAS}.{name} {operator} {STAGING_ALIAS}.{name}")
            })
            .collect::<Vec<_>>()
            .join(" and ")
    }
}
