use std::future::Future;
use std::time::Instant;

use config::shared::{BulkConfig, BulkEngineConfig};
use metrics::{counter, histogram};
use postgres::schema::TableName;
use tracing::{error, info};

use crate::backend::{BulkBackend, PgBulkClient};
use crate::codec::CopyFormat;
use crate::concurrency::cancel::CancelRx;
use crate::error::BulkResult;
use crate::metrics::{
    BULK_OPERATION_DURATION_SECONDS, BULK_OPERATION_FAILURES_TOTAL, ERROR_KIND_LABEL,
    OPERATION_LABEL, TABLE_NAME_LABEL,
};
use crate::operations::delete::delete;
use crate::operations::insert::insert;
use crate::operations::options::{DeleteOptions, InsertOptions};
use crate::operations::OperationContext;
use crate::source::RowSource;
use crate::types::BulkEntity;

/// Runs bulk operations against a backend.
///
/// The engine holds no per-call state, so one engine serves any number of sequential calls. All
/// calls share the session of the backend.
///
/// # Examples
///
/// ```rust,no_run
/// use bulk::operations::{BulkEngine, InsertOptions};
/// use bulk::source::RowSource;
/// use bulk::types::FieldBag;
/// use config::shared::BulkEngineConfig;
/// use postgres::schema::TableName;
///
/// # async fn run(config: BulkEngineConfig) -> bulk::error::BulkResult<()> {
/// let engine = BulkEngine::connect(&config).await?;
///
/// let mut rows = vec![
///     FieldBag::new().with("name", "ada").with("email", "ada@example.com"),
///     FieldBag::new().with("name", "grace").with("email", "grace@example.com"),
/// ];
/// let inserted = engine
///     .bulk_insert(
///         &TableName::in_default_schema("customers"),
///         RowSource::bags(&mut rows),
///         &engine.insert_options(),
///     )
///     .await?;
/// assert_eq!(inserted, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BulkEngine<B> {
    backend: B,
    config: BulkConfig,
    cancel_rx: Option<CancelRx>,
}

impl BulkEngine<PgBulkClient> {
    /// Validates `config` and connects to the database it describes.
    pub async fn connect(config: &BulkEngineConfig) -> BulkResult<Self> {
        config.validate()?;
        let client = PgBulkClient::connect(config.pg_connection.clone()).await?;

        Ok(Self::with_config(client, config.bulk.clone()))
    }
}

impl<B: BulkBackend> BulkEngine<B> {
    /// Creates an engine using the default [`BulkConfig`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, BulkConfig::default())
    }

    pub fn with_config(backend: B, config: BulkConfig) -> Self {
        Self {
            backend,
            config,
            cancel_rx: None,
        }
    }

    /// Makes every operation of the engine stop once `cancel_rx` signals cancellation.
    pub fn with_cancellation(mut self, cancel_rx: CancelRx) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Returns insert options initialized from the engine configuration.
    pub fn insert_options(&self) -> InsertOptions {
        InsertOptions::from(&self.config)
    }

    /// Returns delete options initialized from the engine configuration.
    pub fn delete_options(&self) -> DeleteOptions {
        DeleteOptions::from(&self.config)
    }

    /// Inserts rows through the text COPY format and returns the number of inserted rows.
    ///
    /// With [`InsertOptions::return_identity`] the generated primary key of every row is written
    /// back onto the row.
    pub async fn bulk_insert<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        let ctx = self.context();
        self.observe(
            "insert",
            destination,
            insert(&ctx, destination, source.into(), options, CopyFormat::Text),
        )
        .await
    }

    /// Deletes the destination rows matching the source rows and returns the number of removed
    /// rows.
    pub async fn bulk_delete<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        let ctx = self.context();
        self.observe(
            "delete",
            destination,
            delete(&ctx, destination, source.into(), options, CopyFormat::Text),
        )
        .await
    }

    /// Same as [`BulkEngine::bulk_insert`], encoding rows in the binary COPY format.
    pub async fn binary_bulk_insert<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        let ctx = self.context();
        self.observe(
            "binary_insert",
            destination,
            insert(&ctx, destination, source.into(), options, CopyFormat::Binary),
        )
        .await
    }

    /// Same as [`BulkEngine::bulk_delete`], encoding rows in the binary COPY format.
    ///
    /// Accepts primary key values through [`RowSource::keys`] as well as full rows.
    pub async fn binary_bulk_delete<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        let ctx = self.context();
        self.observe(
            "binary_delete",
            destination,
            delete(&ctx, destination, source.into(), options, CopyFormat::Binary),
        )
        .await
    }

    /// Inserts entities into their declared relation.
    ///
    /// The declared column mappings of `E` apply unless `options` carries explicit ones.
    pub async fn bulk_insert_entities<E: BulkEntity>(
        &self,
        entities: &mut [E],
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        let mut options = options.clone();
        if options.mappings.is_none() {
            options.mappings = Some(E::column_mappings());
        }

        self.bulk_insert(&E::table_name(), RowSource::records(entities), &options)
            .await
    }

    /// Deletes entities from their declared relation.
    pub async fn bulk_delete_entities<E: BulkEntity>(
        &self,
        entities: &mut [E],
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        let mut options = options.clone();
        if options.mappings.is_none() {
            options.mappings = Some(E::column_mappings());
        }

        self.bulk_delete(&E::table_name(), RowSource::records(entities), &options)
            .await
    }

    fn context(&self) -> OperationContext<'_, B> {
        OperationContext {
            backend: &self.backend,
            cancel_rx: self.cancel_rx.as_ref(),
            staging_prefix: &self.config.staging_prefix,
        }
    }

    /// Records the duration and outcome of an operation.
    async fn observe<F>(
        &self,
        operation: &'static str,
        destination: &TableName,
        future: F,
    ) -> BulkResult<u64>
    where
        F: Future<Output = BulkResult<u64>>,
    {
        let started = Instant::now();
        let result = future.await;
        let elapsed = started.elapsed();

        histogram!(
            BULK_OPERATION_DURATION_SECONDS,
            OPERATION_LABEL => operation,
            TABLE_NAME_LABEL => destination.to_string()
        )
        .record(elapsed.as_secs_f64());

        match &result {
            Ok(rows) => {
                info!(
                    operation,
                    table = %destination,
                    rows,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "bulk operation completed"
                );
            }
            Err(err) => {
                counter!(
                    BULK_OPERATION_FAILURES_TOTAL,
                    OPERATION_LABEL => operation,
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);
                error!(
                    operation,
                    table = %destination,
                    error = %err,
                    "bulk operation failed"
                );
            }
        }

        result
    }
}
