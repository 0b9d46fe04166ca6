use pg_escape::quote_identifier;
use postgres::schema::{ColumnSchema, TableName, TableSchema};
use tracing::{debug, info};

use crate::backend::BulkBackend;
use crate::bail;
use crate::codec::{CopyColumn, CopyFormat, CopyPlan};
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::failpoints::{STAGING_AFTER_CREATE, bulk_fail_point};
use crate::mapping::{ResolvedMapping, resolve_mappings};
use crate::operations::options::{IdentityBehavior, InsertOptions};
use crate::operations::{OperationContext, require_source};
use crate::reconcile::{
    advance_sequence, read_identities, serial_sequence_expression, write_identities,
};
use crate::source::{Adapted, RowSource, SourceRows, adapt};
use crate::staging::{ORDINAL_COLUMN, StagingLayout, StagingTable};
use crate::transfer::{load, validate_batch_size};

/// Inserts the rows of `source` into `destination`.
///
/// Without identity return the rows are copied straight into the destination. With identity
/// return they go through a staging relation carrying the source position of every row, so
/// that the generated keys can be written back in input order.
pub(crate) async fn insert<B: BulkBackend>(
    ctx: &OperationContext<'_, B>,
    destination: &TableName,
    source: Option<RowSource<'_>>,
    options: &InsertOptions,
    format: CopyFormat,
) -> BulkResult<u64> {
    let source = require_source(source, "insert", destination)?;
    validate_batch_size(options.batch_size)?;

    let returns_identity =
        options.return_identity && options.identity_behavior == IdentityBehavior::ResetIdentity;
    if returns_identity && source.is_reader() {
        bail!(
            ErrorKind::InvalidInput,
            "Identities cannot be returned to a reader",
            format!(
                "Rows read once from a reader cannot receive the identities generated by {destination}"
            )
        );
    }

    let adapted = match adapt(source).await? {
        Adapted::Empty => {
            debug!(table = %destination, "source is empty, nothing to insert");
            return Ok(0);
        }
        Adapted::Rows(adapted) => adapted,
        Adapted::Keys(_) => bail!(
            ErrorKind::InvalidInput,
            "Primary key values cannot be inserted",
            format!("A key source was given to insert into {destination}, which needs full rows")
        ),
    };

    let schema = ctx.destination_schema(destination).await?;
    let resolved = resolve_mappings(options.mappings.as_deref(), &adapted.shape, &schema)?;

    let identity_key = if returns_identity {
        Some(identity_key(&schema)?)
    } else {
        None
    };

    let mappings = match options.identity_behavior {
        IdentityBehavior::KeepIdentity => resolved.clone(),
        IdentityBehavior::ResetIdentity => resolved
            .iter()
            .filter(|mapping| !mapping.column.generated)
            .cloned()
            .collect::<Vec<_>>(),
    };
    if mappings.is_empty() {
        bail!(
            ErrorKind::SchemaMismatch,
            "Only generated columns are mapped",
            format!(
                "Every mapped column of {destination} is generated and identities are reset"
            )
        );
    }
    format.check_columns(&schema.name, mappings.iter().map(|mapping| &mapping.column))?;

    let mut rows = adapted.rows;

    match identity_key {
        Some(key) => {
            let identity_field = resolved
                .iter()
                .find(|mapping| mapping.column.name == key.name)
                .map(|mapping| mapping.source_field.clone())
                .unwrap_or_else(|| key.name.clone());

            if let SourceRows::Borrowed(rows) = &rows
                && let Some(position) = rows
                    .iter()
                    .position(|row| !row.accepts_field(&identity_field))
            {
                bail!(
                    ErrorKind::SchemaMismatch,
                    "Rows cannot receive the returned identity",
                    format!(
                        "Row {position} has no field '{identity_field}' to write the identity generated by {destination} to"
                    )
                );
            }

            let inserted = insert_returning_identities(
                ctx,
                &schema,
                key,
                &identity_field,
                &mappings,
                &mut rows,
                options,
                format,
            )
            .await?;

            info!(table = %destination, rows = inserted, "inserted rows and returned identities");

            Ok(inserted)
        }
        None => {
            let plan = CopyPlan::new(
                schema.name.as_quoted_identifier(),
                mappings.iter().map(CopyColumn::from).collect(),
                format,
            );

            let inserted = load(
                ctx.backend,
                &schema.name,
                &plan,
                &mut rows,
                options.batch_size,
                ctx.cancel_rx,
            )
            .await?;

            if options.identity_behavior == IdentityBehavior::KeepIdentity {
                for mapping in mappings.iter().filter(|mapping| mapping.column.generated) {
                    advance_sequence(ctx.backend, &schema.name, &mapping.column, ctx.cancel_rx)
                        .await?;
                }
            }

            info!(table = %destination, rows = inserted, "inserted rows");

            Ok(inserted)
        }
    }
}

/// Returns the generated single-column primary key identities are returned for.
fn identity_key(schema: &TableSchema) -> BulkResult<&ColumnSchema> {
    let key_columns = schema.primary_key_columns();

    match key_columns.as_slice() {
        [key] if key.generated => Ok(*key),
        [key] => bail!(
            ErrorKind::SchemaMismatch,
            "Primary key is not generated",
            format!(
                "Column '{}' of table {} has no identity or sequence default, so there is no identity to return",
                key.name, schema.name
            )
        ),
        [] => bail!(
            ErrorKind::SchemaMismatch,
            "Destination has no primary key",
            format!("Table {} has no primary key to return identities of", schema.name)
        ),
        _ => bail!(
            ErrorKind::SchemaMismatch,
            "Primary key has multiple columns",
            format!(
                "Table {} has a primary key of {} columns, identities need a single column",
                schema.name,
                key_columns.len()
            )
        ),
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_returning_identities<B: BulkBackend>(
    ctx: &OperationContext<'_, B>,
    schema: &TableSchema,
    key: &ColumnSchema,
    identity_field: &str,
    mappings: &[ResolvedMapping],
    rows: &mut SourceRows<'_>,
    options: &InsertOptions,
    format: CopyFormat,
) -> BulkResult<u64> {
    let mut columns = vec![key];
    columns.extend(mappings.iter().map(|mapping| &mapping.column));

    let layout = StagingLayout {
        destination: &schema.name,
        columns,
        with_ordinal: true,
    };
    let staging =
        StagingTable::create(ctx.backend, options.staging, ctx.staging_prefix, &layout).await?;

    let result = async {
        bulk_fail_point(STAGING_AFTER_CREATE)?;

        let plan = CopyPlan::new(
            staging.relation().to_string(),
            mappings.iter().map(CopyColumn::from).collect(),
            format,
        )
        .with_ordinal_column(ORDINAL_COLUMN);
        let staged = load(
            ctx.backend,
            &schema.name,
            &plan,
            rows,
            options.batch_size,
            ctx.cancel_rx,
        )
        .await?;

        let assign = format!(
            "update {} set {} = nextval({})",
            staging.relation(),
            key.quoted_name(),
            serial_sequence_expression(&schema.name, key)
        );
        ctx.execute_set_statement("Identity assignment failed", &assign)
            .await?;

        let column_list = layout
            .columns
            .iter()
            .map(|column| column.quoted_name())
            .collect::<Vec<_>>()
            .join(", ");
        let overriding = if key.identity_always {
            " overriding system value"
        } else {
            ""
        };
        let insert = format!(
            "insert into {} ({column_list}){overriding} select {column_list} from {} order by {}",
            schema.name.as_quoted_identifier(),
            staging.relation(),
            quote_identifier(ORDINAL_COLUMN)
        );
        let inserted = ctx
            .execute_set_statement("Insert from staging failed", &insert)
            .await?;

        debug!(
            table = %schema.name,
            staging = %staging.relation(),
            staged,
            inserted,
            "moved staged rows into destination"
        );

        let identities = read_identities(ctx.backend, staging.relation(), key, ctx.cancel_rx).await?;
        match rows {
            SourceRows::Borrowed(rows) => write_identities(rows, identity_field, identities)?,
            SourceRows::Owned(_) | SourceRows::Stream { .. } => bail!(
                ErrorKind::ReconciliationFailure,
                "Rows cannot receive identities",
                format!("The rows inserted into {} are not held by the caller", schema.name)
            ),
        }

        Ok::<_, BulkError>(inserted)
    }
    .await;

    staging.finish(result).await
}
