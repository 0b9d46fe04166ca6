//! Boundary between the engine and the database it writes to.

mod client;

use std::future::Future;

use postgres::schema::{TableName, TableSchema};
use bytes::Bytes;

use crate::error::BulkResult;

pub use client::PgBulkClient;

/// A row returned by [`BulkBackend::query`], one optional text value per selected column.
pub type TextRow = Vec<Option<String>>;

/// Encoded COPY data, split into chunks that are sent one after the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPayload {
    pub chunks: Vec<Bytes>,
    /// Number of rows encoded in the chunks.
    pub rows: u64,
}

impl CopyPayload {
    /// Returns the total size of the payload in bytes.
    pub fn size(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}

/// Trait for databases that bulk operations run against.
///
/// The engine only needs relation metadata, plain statement execution, text queries and the
/// `COPY ... FROM STDIN` transport. Implementations share one session across clones, so that
/// session-temporary staging relations stay visible for the whole operation.
pub trait BulkBackend: Clone + Send + Sync + 'static {
    /// Returns the metadata of a table, or [`None`] if the table does not exist.
    ///
    /// Columns are returned in ordinal order, generated columns are excluded.
    fn table_schema(
        &self,
        table_name: &TableName,
    ) -> impl Future<Output = BulkResult<Option<TableSchema>>> + Send;

    /// Executes a statement and returns the number of affected rows.
    fn execute(&self, statement: &str) -> impl Future<Output = BulkResult<u64>> + Send;

    /// Runs a query and returns its rows in text form.
    fn query(&self, statement: &str) -> impl Future<Output = BulkResult<Vec<TextRow>>> + Send;

    /// Streams a COPY payload through a `copy ... from stdin` statement and returns the number
    /// of rows the backend loaded.
    fn copy_in(
        &self,
        statement: &str,
        payload: CopyPayload,
    ) -> impl Future<Output = BulkResult<u64>> + Send;
}
