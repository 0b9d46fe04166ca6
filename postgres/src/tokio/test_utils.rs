use config::shared::{IntoConnectOptions, PgConnectionConfig};
use pg_escape::{quote_identifier, quote_literal};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls};

use crate::schema::TableName;

/// Isolated Postgres database used by tests.
///
/// The database is created on construction and dropped, together with all its connections,
/// when the value is dropped.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Option<Client>,
    destroy_on_drop: bool,
}

impl PgDatabase {
    /// Creates a new database named after `config.name` and connects to it.
    pub async fn new(config: PgConnectionConfig) -> Self {
        let client = create_pg_database(&config).await;

        Self {
            config,
            client: Some(client),
            destroy_on_drop: true,
        }
    }

    /// Creates an additional connection to the same database.
    ///
    /// The duplicate does not drop the database when dropped.
    pub async fn duplicate(&self) -> Self {
        let client = connect_to_pg_database(&self.config).await;

        Self {
            config: self.config.clone(),
            client: Some(client),
            destroy_on_drop: false,
        }
    }

    fn client(&self) -> &Client {
        self.client.as_ref().expect("database client is set")
    }

    /// Creates a table with the given columns.
    ///
    /// When `add_identity_column` is `true`, a `bigint generated always as identity` primary key
    /// named `id` is prepended to the columns.
    pub async fn create_table(
        &self,
        table_name: &TableName,
        add_identity_column: bool,
        columns: &[(&str, &str)],
    ) -> Result<(), tokio_postgres::Error> {
        let mut column_definitions = Vec::with_capacity(columns.len() + 1);
        if add_identity_column {
            column_definitions.push("id bigint generated always as identity primary key".to_string());
        }
        for (name, typ) in columns {
            column_definitions.push(format!("{} {}", quote_identifier(name), typ));
        }

        let query = format!(
            "create table {} ({})",
            table_name.as_quoted_identifier(),
            column_definitions.join(", ")
        );
        self.client().execute(&query, &[]).await?;

        Ok(())
    }

    /// Inserts a single row of values into the table.
    pub async fn insert_values(
        &self,
        table_name: &TableName,
        columns: &[&str],
        values: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        let column_list = columns
            .iter()
            .map(|column| quote_identifier(column).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=values.len())
            .map(|index| format!("${index}"))
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!(
            "insert into {} ({column_list}) values ({placeholders})",
            table_name.as_quoted_identifier()
        );

        self.client().execute(&query, values).await
    }

    /// Executes arbitrary SQL on the database and returns the affected rows.
    pub async fn run_sql(&self, sql: &str) -> Result<u64, tokio_postgres::Error> {
        self.client().execute(sql, &[]).await
    }

    /// Returns the number of rows in the table.
    pub async fn count_rows(&self, table_name: &TableName) -> Result<i64, tokio_postgres::Error> {
        let query = format!(
            "select count(*) from {}",
            table_name.as_quoted_identifier()
        );
        let row = self.client().query_one(&query, &[]).await?;

        Ok(row.get(0))
    }

    /// Returns the number of relations, temporary ones included, whose name starts with `prefix`.
    pub async fn count_relations_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<i64, tokio_postgres::Error> {
        let query = format!(
            "select count(*) from pg_class where relkind = 'r' and starts_with(relname, {})",
            quote_literal(prefix)
        );
        let row = self.client().query_one(&query, &[]).await?;

        Ok(row.get(0))
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        if self.destroy_on_drop {
            // Close the client first so the database has no more open sessions from us.
            self.client.take();

            ::tokio::task::block_in_place(move || {
                ::tokio::runtime::Handle::current()
                    .block_on(async move { drop_pg_database(&self.config).await });
            });
        }
    }
}

async fn connect(config: Config) -> Client {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");

    ::tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::info!("test postgres connection terminated: {}", e);
        }
    });

    client
}

/// Connects to the database named in the supplied config.
pub async fn connect_to_pg_database(config: &PgConnectionConfig) -> Client {
    connect(config.with_db()).await
}

/// Creates a new Postgres database and returns a client connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> Client {
    let client = connect(config.without_db()).await;
    client
        .execute(
            &format!("create database {}", quote_identifier(&config.name)),
            &[],
        )
        .await
        .expect("Failed to create database");

    connect_to_pg_database(config).await
}

/// Drops a Postgres database and terminates all connections.
///
/// This function will not panic on errors, it reports them and continues, so test cleanup
/// doesn't fail when databases are already gone.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let (client, connection) = match config.without_db().connect(NoTls).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };
    ::tokio::spawn(connection);

    if let Err(e) = client
        .execute(
            &format!(
                "select pg_terminate_backend(pg_stat_activity.pid)
                from pg_stat_activity
                where pg_stat_activity.datname = {}
                and pid <> pg_backend_pid()",
                quote_literal(&config.name)
            ),
            &[],
        )
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = client
        .execute(
            &format!("drop database if exists {}", quote_identifier(&config.name)),
            &[],
        )
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}
