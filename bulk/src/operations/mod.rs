//! Public bulk operations.
//!
//! Every operation runs the same sequence of steps: adapt the source, look up the destination,
//! resolve mappings, optionally create a staging relation, load the rows, run the set-based
//! statement, reconcile and drop the staging relation. Input checks happen before the backend
//! is contacted.

mod delete;
mod engine;
mod insert;
mod options;

use postgres::schema::{TableName, TableSchema};

use crate::backend::BulkBackend;
use crate::bulk_error;
use crate::concurrency::cancel::{CancelRx, ensure_not_cancelled, run_cancellable};
use crate::error::{BulkError, BulkResult, ErrorKind};

pub use engine::BulkEngine;
pub use options::{DeleteOptions, IdentityBehavior, InsertOptions};

/// Shared state of one operation call.
pub(crate) struct OperationContext<'a, B> {
    pub(crate) backend: &'a B,
    pub(crate) cancel_rx: Option<&'a CancelRx>,
    pub(crate) staging_prefix: &'a str,
}

impl<B: BulkBackend> OperationContext<'_, B> {
    /// Loads the metadata of the destination.
    ///
    /// Fails with [`ErrorKind::MissingRelation`] when the destination does not exist.
    pub(crate) async fn destination_schema(
        &self,
        destination: &TableName,
    ) -> BulkResult<TableSchema> {
        ensure_not_cancelled(self.cancel_rx)?;

        let schema = run_cancellable(self.cancel_rx, self.backend.table_schema(destination))
            .await?;

        match schema {
            Some(schema) => Ok(schema),
            None => Err(bulk_error!(
                ErrorKind::MissingRelation,
                "Destination relation does not exist",
                format!("Table {destination} was not found")
            )),
        }
    }

    /// Runs a set-based statement and returns the number of affected rows.
    ///
    /// Cancellation is checked before the statement is sent. Once sent, the statement is
    /// awaited to completion because the server applies it even if the client stops waiting,
    /// so the returned count always matches what happened. Backend failures are reported as
    /// [`ErrorKind::TransferFailure`].
    pub(crate) async fn execute_set_statement(
        &self,
        description: &'static str,
        statement: &str,
    ) -> BulkResult<u64> {
        ensure_not_cancelled(self.cancel_rx)?;

        self.backend
            .execute(statement)
            .await
            .map_err(|err| transfer_error(description, statement, err))
    }
}

fn transfer_error(description: &'static str, statement: &str, err: BulkError) -> BulkError {
    match err.kind() {
        ErrorKind::Cancelled => err,
        _ => bulk_error!(
            ErrorKind::TransferFailure,
            description,
            format!("Statement failed: {statement}"),
            source: err
        ),
    }
}

/// Fails with [`ErrorKind::InvalidInput`] when no source was given.
pub(crate) fn require_source<T>(
    source: Option<T>,
    operation: &'static str,
    destination: &TableName,
) -> BulkResult<T> {
    source.ok_or_else(|| {
        bulk_error!(
            ErrorKind::InvalidInput,
            "Row source is missing",
            format!("No rows were given to {operation} on {destination}")
        )
    })
}
