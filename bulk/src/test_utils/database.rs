use config::shared::{PgConnectionConfig, TlsConfig};
use postgres::schema::TableName;
use postgres::tokio::test_utils::PgDatabase;
use tokio_postgres::Client;
use uuid::Uuid;

use crate::backend::PgBulkClient;
use crate::operations::BulkEngine;

/// The schema name used for organizing test tables.
pub const TEST_DATABASE_SCHEMA: &str = "test";

/// Creates a [`TableName`] in the test schema.
pub fn test_table_name(name: &str) -> TableName {
    TableName::new(TEST_DATABASE_SCHEMA, name)
}

/// Generates the connection configuration of an isolated test database.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        // Generate unique database name for test isolation
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
        keepalive: None,
    }
}

/// Creates a new test database with a unique name and the test schema.
///
/// # Panics
///
/// Panics if the database or the test schema cannot be created.
pub async fn spawn_database() -> PgDatabase {
    let database = PgDatabase::new(local_pg_connection_config()).await;

    database
        .run_sql(&format!("create schema {TEST_DATABASE_SCHEMA}"))
        .await
        .expect("Failed to create test schema");

    database
}

/// Connects a bulk engine to the test database through its own session.
///
/// # Panics
///
/// Panics if the connection fails.
pub async fn connect_engine(database: &PgDatabase) -> BulkEngine<PgBulkClient> {
    let client = PgBulkClient::connect(database.config.clone())
        .await
        .expect("Failed to connect the bulk engine");

    BulkEngine::new(client)
}

/// Returns the client of the test database.
pub fn database_client(database: &PgDatabase) -> &Client {
    database
        .client
        .as_ref()
        .expect("test database client is set")
}

/// Creates a customers table shaped like [`crate::test_utils::schema::customers_schema`].
///
/// # Panics
///
/// Panics if the table cannot be created.
pub async fn create_customers_table(database: &PgDatabase, table_name: &TableName) {
    database
        .create_table(table_name, true, &[("name", "text not null"), ("email", "text")])
        .await
        .expect("Failed to create customers table");
}

/// Returns the `(id, name, email)` rows of a customers table ordered by id.
///
/// # Panics
///
/// Panics if the query fails.
pub async fn fetch_customers(
    database: &PgDatabase,
    table_name: &TableName,
) -> Vec<(i64, String, Option<String>)> {
    database_client(database)
        .query(
            &format!(
                "select id, name, email from {} order by id",
                table_name.as_quoted_identifier()
            ),
            &[],
        )
        .await
        .expect("Failed to fetch customers")
        .iter()
        .map(|row| (row.get(0), row.get(1), row.get(2)))
        .collect()
}

/// Returns the number of staging relations left behind with the given name prefix.
///
/// # Panics
///
/// Panics if the query fails.
pub async fn count_staging_relations(database: &PgDatabase, prefix: &str) -> i64 {
    database
        .count_relations_with_prefix(prefix)
        .await
        .expect("Failed to count staging relations")
}
