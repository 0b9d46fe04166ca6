//! Blocking counterpart of [`crate::operations::BulkEngine`].
//!
//! Each engine owns a current-thread runtime and drives the asynchronous operations on it, so
//! the operations, their checks and their error kinds are identical to the asynchronous ones.
//! Must not be used from within an asynchronous context.

use config::shared::{BulkConfig, BulkEngineConfig};
use postgres::schema::TableName;
use tokio::runtime::{Builder, Runtime};

use crate::backend::{BulkBackend, PgBulkClient};
use crate::concurrency::cancel::CancelRx;
use crate::error::BulkResult;
use crate::operations::{self, DeleteOptions, InsertOptions};
use crate::source::RowSource;
use crate::types::BulkEntity;

/// Runs bulk operations to completion on the calling thread.
#[derive(Debug)]
pub struct BulkEngine<B> {
    inner: operations::BulkEngine<B>,
    runtime: Runtime,
}

impl BulkEngine<PgBulkClient> {
    /// Connects to the database described by `config`.
    ///
    /// The connection is driven by the runtime of the engine and only makes progress while an
    /// operation runs.
    pub fn connect(config: &BulkEngineConfig) -> BulkResult<Self> {
        let runtime = build_runtime()?;
        let inner = runtime.block_on(operations::BulkEngine::connect(config))?;

        Ok(Self { inner, runtime })
    }
}

impl<B: BulkBackend> BulkEngine<B> {
    pub fn new(backend: B) -> BulkResult<Self> {
        Self::with_config(backend, BulkConfig::default())
    }

    pub fn with_config(backend: B, config: BulkConfig) -> BulkResult<Self> {
        Ok(Self {
            inner: operations::BulkEngine::with_config(backend, config),
            runtime: build_runtime()?,
        })
    }

    pub fn with_cancellation(self, cancel_rx: CancelRx) -> Self {
        Self {
            inner: self.inner.with_cancellation(cancel_rx),
            runtime: self.runtime,
        }
    }

    pub fn backend(&self) -> &B {
        self.inner.backend()
    }

    pub fn insert_options(&self) -> InsertOptions {
        self.inner.insert_options()
    }

    pub fn delete_options(&self) -> DeleteOptions {
        self.inner.delete_options()
    }

    pub fn bulk_insert<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.bulk_insert(destination, source, options))
    }

    pub fn bulk_delete<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.bulk_delete(destination, source, options))
    }

    pub fn binary_bulk_insert<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.binary_bulk_insert(destination, source, options))
    }

    pub fn binary_bulk_delete<'a>(
        &self,
        destination: &TableName,
        source: impl Into<Option<RowSource<'a>>>,
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.binary_bulk_delete(destination, source, options))
    }

    pub fn bulk_insert_entities<E: BulkEntity>(
        &self,
        entities: &mut [E],
        options: &InsertOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.bulk_insert_entities(entities, options))
    }

    pub fn bulk_delete_entities<E: BulkEntity>(
        &self,
        entities: &mut [E],
        options: &DeleteOptions,
    ) -> BulkResult<u64> {
        self.runtime
            .block_on(self.inner.bulk_delete_entities(entities, options))
    }
}

fn build_runtime() -> BulkResult<Runtime> {
    let runtime = Builder::new_current_thread().enable_all().build()?;

    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapping::ColumnMapping;
    use crate::test_utils::recording::RecordingBackend;
    use crate::test_utils::schema::customers_schema;
    use crate::types::FieldBag;

    fn inspect<T>(future: impl std::future::Future<Output = T>) -> T {
        Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn blocking_insert_loads_rows() {
        let backend = RecordingBackend::new().with_schema(customers_schema());
        let engine = BulkEngine::new(backend.clone()).unwrap();
        let mut rows = vec![
            FieldBag::new().with("name", "ada"),
            FieldBag::new().with("name", "grace"),
        ];

        let inserted = engine
            .bulk_insert(
                &customers_schema().name,
                RowSource::bags(&mut rows),
                &engine.insert_options(),
            )
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(inspect(backend.copies()).len(), 1);
    }

    #[test]
    fn invalid_mappings_are_schema_mismatches() {
        let backend = RecordingBackend::new().with_schema(customers_schema());
        let engine = BulkEngine::new(backend.clone()).unwrap();
        let mut rows = vec![FieldBag::new().with("name", "ada").with("id", 1i64)];
        let options = engine
            .insert_options()
            .with_mappings([ColumnMapping::new("name", "id"), ColumnMapping::new("id", "name")]);

        let err = engine
            .bulk_insert(&customers_schema().name, RowSource::bags(&mut rows), &options)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(inspect(backend.copies()).is_empty());
    }

    #[test]
    fn missing_source_is_invalid_input() {
        let backend = RecordingBackend::new().with_schema(customers_schema());
        let engine = BulkEngine::new(backend).unwrap();

        let err = engine
            .bulk_delete(
                &customers_schema().name,
                Option::<RowSource>::None,
                &engine.delete_options(),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
