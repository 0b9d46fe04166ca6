use std::sync::Arc;

use postgres::schema::{TableName, TableSchema};
use tokio::sync::Mutex;
use tracing::info;

use crate::backend::{BulkBackend, CopyPayload, TextRow};
use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};

/// A COPY received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRecord {
    pub statement: String,
    /// The payload chunks, concatenated.
    pub data: Vec<u8>,
    pub rows: u64,
}

/// A call received by a [`RecordingBackend`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    SchemaLookup(TableName),
    Execute(String),
    Query(String),
    CopyIn(CopyRecord),
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    schemas: Vec<TableSchema>,
    failures: Vec<(String, ErrorKind)>,
    execute_counts: Vec<(String, u64)>,
    query_rows: Vec<(String, Vec<TextRow>)>,
}

impl Behavior {
    fn check_failure(&self, statement: &str) -> BulkResult<()> {
        match self
            .failures
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
        {
            Some((pattern, kind)) => Err(bulk_error!(
                *kind,
                "Injected backend failure",
                format!("Statement matched '{pattern}': {statement}")
            )),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    statements: Vec<Statement>,
}

/// In-memory [`BulkBackend`] recording every call.
///
/// Serves the configured table schemas, answers executes and queries with configured results
/// and fails the statements containing a configured pattern. Failing statements are recorded
/// too. Clones share their recordings.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    behavior: Arc<Behavior>,
    inner: Arc<Mutex<Inner>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `schema` for lookups of its table.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        Arc::make_mut(&mut self.behavior).schemas.push(schema);
        self
    }

    /// Fails every statement containing `pattern` with an error of `kind`.
    pub fn fail_on(mut self, pattern: impl Into<String>, kind: ErrorKind) -> Self {
        Arc::make_mut(&mut self.behavior)
            .failures
            .push((pattern.into(), kind));
        self
    }

    /// Reports `count` affected rows for executed statements containing `pattern`.
    ///
    /// Other statements report no affected rows.
    pub fn on_execute(mut self, pattern: impl Into<String>, count: u64) -> Self {
        Arc::make_mut(&mut self.behavior)
            .execute_counts
            .push((pattern.into(), count));
        self
    }

    /// Returns `rows` for queries containing `pattern`.
    ///
    /// Other queries return no rows.
    pub fn on_query(mut self, pattern: impl Into<String>, rows: Vec<TextRow>) -> Self {
        Arc::make_mut(&mut self.behavior)
            .query_rows
            .push((pattern.into(), rows));
        self
    }

    /// Returns every call received so far.
    pub async fn statements(&self) -> Vec<Statement> {
        let inner = self.inner.lock().await;
        inner.statements.clone()
    }

    /// Returns the executed statements.
    pub async fn executed(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Execute(statement) => Some(statement.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the queries.
    pub async fn queried(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Query(statement) => Some(statement.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the received COPY invocations.
    pub async fn copies(&self) -> Vec<CopyRecord> {
        let inner = self.inner.lock().await;
        inner
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::CopyIn(copy) => Some(copy.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, statement: Statement) {
        let mut inner = self.inner.lock().await;
        inner.statements.push(statement);
    }
}

impl BulkBackend for RecordingBackend {
    async fn table_schema(&self, table_name: &TableName) -> BulkResult<Option<TableSchema>> {
        self.record(Statement::SchemaLookup(table_name.clone()))
            .await;

        Ok(self
            .behavior
            .schemas
            .iter()
            .find(|schema| schema.name == *table_name)
            .cloned())
    }

    async fn execute(&self, statement: &str) -> BulkResult<u64> {
        info!(statement, "recording execute");
        self.record(Statement::Execute(statement.to_string()))
            .await;
        self.behavior.check_failure(statement)?;

        Ok(self
            .behavior
            .execute_counts
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
            .map(|(_, count)| *count)
            .unwrap_or(0))
    }

    async fn query(&self, statement: &str) -> BulkResult<Vec<TextRow>> {
        info!(statement, "recording query");
        self.record(Statement::Query(statement.to_string())).await;
        self.behavior.check_failure(statement)?;

        Ok(self
            .behavior
            .query_rows
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn copy_in(&self, statement: &str, payload: CopyPayload) -> BulkResult<u64> {
        info!(statement, rows = payload.rows, "recording copy");
        self.record(Statement::CopyIn(CopyRecord {
            statement: statement.to_string(),
            data: payload.chunks.concat(),
            rows: payload.rows,
        }))
        .await;
        self.behavior.check_failure(statement)?;

        Ok(payload.rows)
    }
}
