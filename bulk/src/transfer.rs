//! Batched loading of rows through COPY.

use futures::StreamExt;
use metrics::counter;
use postgres::schema::TableName;
use tracing::debug;

use crate::backend::{BulkBackend, CopyPayload};
use crate::bail;
use crate::bulk_error;
use crate::codec::CopyPlan;
use crate::concurrency::cancel::{CancelRx, ensure_not_cancelled, run_cancellable};
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::failpoints::{TRANSFER_BEFORE_BATCH, bulk_fail_point};
use crate::metrics::{BULK_BATCHES_LOADED_TOTAL, BULK_ROWS_LOADED_TOTAL, TABLE_NAME_LABEL};
use crate::source::SourceRows;
use crate::types::{FieldBag, Row};

/// Upper bound of the rows buffered from a reader before the batch size is known to be small.
const MAX_READER_PREALLOCATION: usize = 1024;

/// Fails with [`ErrorKind::InvalidInput`] for a batch size of zero.
pub(crate) fn validate_batch_size(batch_size: Option<usize>) -> BulkResult<()> {
    if batch_size == Some(0) {
        bail!(
            ErrorKind::InvalidInput,
            "Batch size must be positive",
            "A batch size of 0 was requested"
        );
    }

    Ok(())
}

/// Loads the rows into the target of `plan`, one COPY invocation per batch.
///
/// Batches are loaded in source order and never split a row. Without a batch size every row
/// goes into a single batch. A failing batch stops the load with
/// [`ErrorKind::TransferFailure`] naming the batch index, batches loaded before stay loaded.
/// Returns the number of rows the backend reported as loaded. Metrics are recorded against
/// `destination`, also when the plan targets a staging relation.
pub(crate) async fn load<B: BulkBackend>(
    backend: &B,
    destination: &TableName,
    plan: &CopyPlan,
    rows: &mut SourceRows<'_>,
    batch_size: Option<usize>,
    cancel_rx: Option<&CancelRx>,
) -> BulkResult<u64> {
    validate_batch_size(batch_size)?;
    let batch_size = batch_size.unwrap_or(usize::MAX);
    let statement = plan.copy_statement();

    let mut loader = BatchLoader {
        backend,
        table_label: destination.to_string(),
        plan,
        statement: &statement,
        cancel_rx,
        batch_index: 0,
        encoded_rows: 0,
        loaded_rows: 0,
    };

    match rows {
        SourceRows::Borrowed(rows) => {
            for batch in rows.chunks(batch_size) {
                let payload = loader.encode(batch.iter().map(|row| &**row as &dyn Row))?;
                loader.copy(payload).await?;
            }
        }
        SourceRows::Owned(rows) => {
            for batch in rows.chunks(batch_size) {
                let payload = loader.encode(batch.iter().map(|row| row as &dyn Row))?;
                loader.copy(payload).await?;
            }
        }
        SourceRows::Stream { first, rest } => {
            let mut batch: Vec<FieldBag> =
                Vec::with_capacity(batch_size.min(MAX_READER_PREALLOCATION));
            batch.extend(first.take());

            let mut exhausted = false;
            while !exhausted {
                while batch.len() < batch_size {
                    match rest.next().await {
                        Some(Ok(row)) => batch.push(row),
                        Some(Err(err)) => return Err(loader.batch_error(err)),
                        None => {
                            exhausted = true;
                            break;
                        }
                    }
                }

                if !batch.is_empty() {
                    let payload = loader.encode(batch.iter().map(|row| row as &dyn Row))?;
                    batch.clear();
                    loader.copy(payload).await?;
                }
            }
        }
    }

    debug!(
        target_relation = %plan.target,
        batches = loader.batch_index,
        rows = loader.loaded_rows,
        "loaded rows"
    );

    Ok(loader.loaded_rows)
}

struct BatchLoader<'a, B> {
    backend: &'a B,
    table_label: String,
    plan: &'a CopyPlan,
    statement: &'a str,
    cancel_rx: Option<&'a CancelRx>,
    batch_index: usize,
    encoded_rows: u64,
    loaded_rows: u64,
}

impl<B: BulkBackend> BatchLoader<'_, B> {
    fn encode<'r>(&mut self, rows: impl Iterator<Item = &'r dyn Row>) -> BulkResult<CopyPayload> {
        ensure_not_cancelled(self.cancel_rx)?;
        bulk_fail_point(TRANSFER_BEFORE_BATCH)?;

        let payload = self
            .plan
            .encode(self.encoded_rows, rows)
            .map_err(|err| self.batch_error(err))?;
        self.encoded_rows += payload.rows;

        Ok(payload)
    }

    async fn copy(&mut self, payload: CopyPayload) -> BulkResult<()> {
        let batch_rows = payload.rows;

        let loaded = run_cancellable(
            self.cancel_rx,
            self.backend.copy_in(self.statement, payload),
        )
        .await
        .map_err(|err| match err.kind() {
            ErrorKind::Cancelled => err,
            _ => self.batch_error(err),
        })?;

        debug!(
            target_relation = %self.plan.target,
            batch = self.batch_index,
            rows = batch_rows,
            loaded,
            "loaded batch"
        );
        counter!(BULK_BATCHES_LOADED_TOTAL, TABLE_NAME_LABEL => self.table_label.clone())
            .increment(1);
        counter!(BULK_ROWS_LOADED_TOTAL, TABLE_NAME_LABEL => self.table_label.clone())
            .increment(loaded);

        self.batch_index += 1;
        self.loaded_rows += loaded;

        Ok(())
    }

    fn batch_error(&self, err: BulkError) -> BulkError {
        bulk_error!(
            ErrorKind::TransferFailure,
            "Batch transfer failed",
            format!(
                "Batch {} into {} failed after {} rows were loaded",
                self.batch_index, self.plan.target, self.loaded_rows
            ),
            source: err
        )
    }
}
