//! Reconciliation of generated identities with the caller's rows.

use pg_escape::{quote_identifier, quote_literal};
use postgres::schema::{ColumnSchema, TableName};
use tracing::debug;

use crate::backend::BulkBackend;
use crate::bulk_error;
use crate::concurrency::cancel::{CancelRx, run_cancellable};
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::failpoints::{RECONCILE_BEFORE_READ_BACK, bulk_fail_point};
use crate::staging::ORDINAL_COLUMN;
use crate::types::{Cell, Row};

/// Returns the expression evaluating to the sequence backing `column`, or null if there is none.
pub(crate) fn serial_sequence_expression(destination: &TableName, column: &ColumnSchema) -> String {
    format!(
        "pg_get_serial_sequence({}, {})",
        quote_literal(&destination.as_quoted_identifier()),
        quote_literal(&column.name)
    )
}

/// Reads the `(ordinal, key)` pairs of the staged rows, in source order.
///
/// Failures are [`ErrorKind::ReconciliationFailure`]: the rows were already loaded.
pub(crate) async fn read_identities<B: BulkBackend>(
    backend: &B,
    staging_relation: &str,
    key_column: &ColumnSchema,
    cancel_rx: Option<&CancelRx>,
) -> BulkResult<Vec<(usize, Cell)>> {
    bulk_fail_point(RECONCILE_BEFORE_READ_BACK)?;

    let ordinal = quote_identifier(ORDINAL_COLUMN);
    let query = format!(
        "select {ordinal}, {} from {staging_relation} order by {ordinal}",
        key_column.quoted_name()
    );

    let rows = run_cancellable(cancel_rx, backend.query(&query))
        .await
        .map_err(|err| reconciliation_error("Identity read back failed", err))?;

    let mut identities = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(Some(ordinal)), Some(Some(key))) = (row.first(), row.get(1)) else {
            return Err(bulk_error!(
                ErrorKind::ReconciliationFailure,
                "Identity read back returned an incomplete row",
                format!("Expected an ordinal and a key, got {row:?}")
            ));
        };

        let ordinal = ordinal
            .parse::<usize>()
            .map_err(|err| reconciliation_error("Identity ordinal is invalid", err.into()))?;
        let key = Cell::String(key.clone())
            .coerce_to(&key_column.typ)
            .map_err(|err| reconciliation_error("Identity value is invalid", err))?;

        identities.push((ordinal, key));
    }

    debug!(
        staging = staging_relation,
        identities = identities.len(),
        "read back generated identities"
    );

    Ok(identities)
}

/// Writes each identity onto the row at its ordinal.
///
/// Every row must receive exactly one identity.
pub(crate) fn write_identities(
    rows: &mut [&mut dyn Row],
    field: &str,
    identities: Vec<(usize, Cell)>,
) -> BulkResult<()> {
    if identities.len() != rows.len() {
        return Err(bulk_error!(
            ErrorKind::ReconciliationFailure,
            "Identity count does not match the row count",
            format!(
                "{} identities were read back for {} rows",
                identities.len(),
                rows.len()
            )
        ));
    }

    for (ordinal, key) in identities {
        let Some(row) = rows.get_mut(ordinal) else {
            return Err(bulk_error!(
                ErrorKind::ReconciliationFailure,
                "Identity ordinal is out of range",
                format!("Ordinal {ordinal} does not identify one of the {} rows", rows.len())
            ));
        };

        row.set_value(field, key).map_err(|err| {
            reconciliation_error("Identity could not be written back onto the row", err)
        })?;
    }

    Ok(())
}

/// Advances the sequence backing `key_column` past the largest key of the destination.
///
/// Used after caller supplied keys were loaded, so that keys generated later do not collide.
/// Does nothing for keys without a sequence.
pub(crate) async fn advance_sequence<B: BulkBackend>(
    backend: &B,
    destination: &TableName,
    key_column: &ColumnSchema,
    cancel_rx: Option<&CancelRx>,
) -> BulkResult<()> {
    let query = format!(
        "select setval(s.seq::regclass, greatest(s.max_key, pg_sequence_last_value(s.seq::regclass), 1)) \
        from (select {} as seq, (select max({}) from {}) as max_key) s \
        where s.seq is not null",
        serial_sequence_expression(destination, key_column),
        key_column.quoted_name(),
        destination.as_quoted_identifier()
    );

    run_cancellable(cancel_rx, backend.query(&query))
        .await
        .map_err(|err| reconciliation_error("Identity sequence could not be advanced", err))?;

    debug!(table = %destination, column = %key_column.name, "advanced identity sequence");

    Ok(())
}

fn reconciliation_error(description: &'static str, err: BulkError) -> BulkError {
    match err.kind() {
        ErrorKind::Cancelled => err,
        _ => bulk_error!(ErrorKind::ReconciliationFailure, description, source: err),
    }
}
