use metrics::counter;
use postgres::schema::{ColumnSchema, TableName, TableSchema};
use tracing::{debug, info};

use crate::backend::BulkBackend;
use crate::bail;
use crate::codec::{CopyColumn, CopyFormat, CopyPlan};
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::failpoints::{STAGING_AFTER_CREATE, bulk_fail_point};
use crate::mapping::resolve_mappings;
use crate::metrics::{BULK_ROWS_DELETED_TOTAL, TABLE_NAME_LABEL};
use crate::operations::options::DeleteOptions;
use crate::operations::{OperationContext, require_source};
use crate::qualifier::{DESTINATION_ALIAS, QualifierSet, STAGING_ALIAS};
use crate::source::{Adapted, AdaptedSource, RowSource, adapt};
use crate::staging::{StagingLayout, StagingTable};
use crate::transfer::{load, validate_batch_size};

/// Deletes the destination rows matching the rows of `source`.
///
/// The qualifier columns of the rows are staged and joined against the destination in one
/// statement. Returns the number of destination rows removed, so repeated input rows count once.
pub(crate) async fn delete<B: BulkBackend>(
    ctx: &OperationContext<'_, B>,
    destination: &TableName,
    source: Option<RowSource<'_>>,
    options: &DeleteOptions,
    format: CopyFormat,
) -> BulkResult<u64> {
    let source = require_source(source, "delete", destination)?;
    validate_batch_size(options.batch_size)?;

    let adapted = adapt(source).await?;
    if matches!(adapted, Adapted::Empty) {
        debug!(table = %destination, "source is empty, nothing to delete");
        return Ok(0);
    }

    let schema = ctx.destination_schema(destination).await?;
    let (adapted, explicit_mappings) = match adapted {
        Adapted::Rows(adapted) => (adapted, options.mappings.as_deref()),
        Adapted::Keys(keys) => {
            let key = single_key(&schema)?;
            (AdaptedSource::from_keys(&key.name, keys), None)
        }
        Adapted::Empty => return Ok(0),
    };

    let mappings = resolve_mappings(explicit_mappings, &adapted.shape, &schema)?;
    let qualifiers = QualifierSet::resolve(options.qualifiers.as_deref(), &schema, &mappings)?;
    let qualifier_mappings = qualifiers.project(&mappings);
    format.check_columns(&schema.name, qualifiers.columns())?;

    let layout = StagingLayout {
        destination: &schema.name,
        columns: qualifiers.columns().iter().collect(),
        with_ordinal: false,
    };
    let staging =
        StagingTable::create(ctx.backend, options.staging, ctx.staging_prefix, &layout).await?;

    let mut rows = adapted.rows;
    let result = async {
        bulk_fail_point(STAGING_AFTER_CREATE)?;

        let plan = CopyPlan::new(
            staging.relation().to_string(),
            qualifier_mappings.iter().map(CopyColumn::from).collect(),
            format,
        );
        let staged = load(
            ctx.backend,
            &schema.name,
            &plan,
            &mut rows,
            options.batch_size,
            ctx.cancel_rx,
        )
        .await?;

        let statement = format!(
            "delete from {} as {DESTINATION_ALIAS} using {} as {STAGING_ALIAS} where {}",
            schema.name.as_quoted_identifier(),
            staging.relation(),
            qualifiers.predicate()
        );
        let deleted = ctx
            .execute_set_statement("Delete by staging join failed", &statement)
            .await?;

        debug!(
            table = %schema.name,
            staging = %staging.relation(),
            staged,
            deleted,
            "deleted rows matching staged rows"
        );

        Ok::<_, BulkError>(deleted)
    }
    .await;

    let deleted = staging.finish(result).await?;

    counter!(BULK_ROWS_DELETED_TOTAL, TABLE_NAME_LABEL => schema.name.to_string())
        .increment(deleted);
    info!(table = %destination, rows = deleted, "deleted rows");

    Ok(deleted)
}

/// Returns the primary key column that key values are matched against.
fn single_key(schema: &TableSchema) -> BulkResult<&ColumnSchema> {
    let key_columns = schema.primary_key_columns();

    match key_columns.as_slice() {
        [key] => Ok(*key),
        [] => bail!(
            ErrorKind::SchemaMismatch,
            "Destination has no primary key",
            format!("Table {} has no primary key to match key values against", schema.name)
        ),
        _ => bail!(
            ErrorKind::SchemaMismatch,
            "Primary key has multiple columns",
            format!(
                "Table {} has a primary key of {} columns, key values need a single column",
                schema.name,
                key_columns.len()
            )
        ),
    }
}
