//! Transient relations used as transfer buffers.
//!
//! A staging relation is shaped like a projection of the destination, loaded through COPY and
//! consumed by one set-based statement. [`StagingTable`] drops it on every exit path: explicitly
//! through [`StagingTable::finish`], or from its [`Drop`] implementation when the operation
//! future is dropped before finishing.

use config::shared::StagingStrategyConfig;
use pg_escape::quote_identifier;
use postgres::schema::{ColumnSchema, TableName};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::BulkBackend;
use crate::bulk_error;
use crate::error::{BulkError, BulkResult, ErrorKind};

/// Name of the column holding the source position of each staged row.
pub(crate) const ORDINAL_COLUMN: &str = "__bulk_ordinal";

/// Where a staging relation is allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StagingStrategy {
    /// A temporary relation, only visible to the session of the operation.
    #[default]
    SessionTemporary,
    /// An unlogged relation in the destination schema, visible to every session while the
    /// operation runs.
    Physical,
}

impl From<StagingStrategyConfig> for StagingStrategy {
    fn from(config: StagingStrategyConfig) -> Self {
        match config {
            StagingStrategyConfig::SessionTemporary => StagingStrategy::SessionTemporary,
            StagingStrategyConfig::Physical => StagingStrategy::Physical,
        }
    }
}

/// Generates a unique staging relation name.
///
/// The random suffix keeps names unique across concurrent operations and process restarts.
pub fn generate_staging_name(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Columns of a staging relation.
#[derive(Debug, Clone)]
pub(crate) struct StagingLayout<'a> {
    pub(crate) destination: &'a TableName,
    pub(crate) columns: Vec<&'a ColumnSchema>,
    pub(crate) with_ordinal: bool,
}

/// Guard over a created staging relation.
#[derive(Debug)]
pub(crate) struct StagingTable<B: BulkBackend> {
    backend: B,
    name: String,
    relation: String,
    strategy: StagingStrategy,
    released: bool,
}

impl<B: BulkBackend> StagingTable<B> {
    /// Creates an empty staging relation with the column types of the destination.
    ///
    /// Fails with [`ErrorKind::StagingFailure`] when the relation cannot be created.
    pub(crate) async fn create(
        backend: &B,
        strategy: StagingStrategy,
        prefix: &str,
        layout: &StagingLayout<'_>,
    ) -> BulkResult<StagingTable<B>> {
        let name = generate_staging_name(prefix);
        let quoted_name = quote_identifier(&name).into_owned();

        let (create, relation) = match strategy {
            StagingStrategy::SessionTemporary => (
                format!("create temporary table {quoted_name}"),
                format!("pg_temp.{quoted_name}"),
            ),
            StagingStrategy::Physical => {
                let relation = format!(
                    "{}.{quoted_name}",
                    quote_identifier(&layout.destination.schema)
                );
                (format!("create unlogged table {relation}"), relation)
            }
        };

        let mut select_list = layout
            .columns
            .iter()
            .map(|column| column.quoted_name())
            .collect::<Vec<_>>();
        if layout.with_ordinal {
            select_list.push(format!(
                "0::bigint as {}",
                quote_identifier(ORDINAL_COLUMN)
            ));
        }

        let statement = format!(
            "{create} as select {} from {} with no data",
            select_list.join(", "),
            layout.destination.as_quoted_identifier()
        );

        backend.execute(&statement).await.map_err(|err| {
            bulk_error!(
                ErrorKind::StagingFailure,
                "Staging relation creation failed",
                format!("Could not create staging relation {relation} for {}", layout.destination),
                source: err
            )
        })?;

        info!(
            staging = %relation,
            destination = %layout.destination,
            strategy = ?strategy,
            "created staging relation"
        );

        Ok(StagingTable {
            backend: backend.clone(),
            name,
            relation,
            strategy,
            released: false,
        })
    }

    /// Returns the unquoted name of the relation.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relation as a quoted, schema qualified identifier.
    pub(crate) fn relation(&self) -> &str {
        &self.relation
    }

    pub(crate) fn strategy(&self) -> StagingStrategy {
        self.strategy
    }

    fn drop_statement(&self) -> String {
        format!("drop table if exists {}", self.relation)
    }

    /// Drops the relation.
    pub(crate) async fn release(mut self) -> BulkResult<()> {
        self.released = true;

        self.backend
            .execute(&self.drop_statement())
            .await
            .map_err(|err| {
                bulk_error!(
                    ErrorKind::StagingFailure,
                    "Staging relation cleanup failed",
                    format!("Could not drop staging relation {}", self.relation),
                    source: err
                )
            })?;

        debug!(staging = %self.relation, "dropped staging relation");

        Ok(())
    }

    /// Drops the relation and combines the cleanup outcome with the result of the operation.
    ///
    /// When both the operation and the cleanup failed, both errors are returned together.
    pub(crate) async fn finish<T>(self, result: BulkResult<T>) -> BulkResult<T> {
        let cleanup = self.release().await;

        match (result, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => Err(BulkError::from(vec![err, cleanup_err])),
        }
    }
}

impl<B: BulkBackend> Drop for StagingTable<B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let statement = self.drop_statement();
        let relation = self.relation.clone();

        match Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                handle.spawn(async move {
                    match backend.execute(&statement).await {
                        Ok(_) => debug!(staging = %relation, "dropped abandoned staging relation"),
                        Err(err) => {
                            warn!(staging = %relation, error = %err, "failed to drop abandoned staging relation")
                        }
                    }
                });
            }
            Err(_) => {
                warn!(
                    staging = %relation,
                    "no runtime available to drop abandoned staging relation"
                );
            }
        }
    }
}
