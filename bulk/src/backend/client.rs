use std::fmt;
use std::io::BufReader;
use std::sync::Arc;

use bytes::Bytes;
use config::shared::{IntoConnectOptions, PgConnectionConfig};
use futures::{SinkExt, pin_mut};
use pg_escape::quote_literal;
use postgres::schema::{ColumnSchema, TableName, TableSchema};
use postgres::types::convert_type_oid_to_type;
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::{Kind, Type};
use tokio_postgres::{Client, Config, Connection, NoTls, SimpleQueryMessage, SimpleQueryRow, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::backend::{BulkBackend, CopyPayload, TextRow};
use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};

/// Spawns a background task to monitor a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        let result = connection.await;

        match result {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends when every clone of the `Client` is dropped, so the handle is not kept.
    tokio::spawn(task);
}

/// A [`BulkBackend`] over a single `tokio-postgres` session.
///
/// Clones share the session. Session-temporary staging relations are only visible to this
/// session, so every step of an operation goes through the same client.
#[derive(Debug, Clone)]
pub struct PgBulkClient {
    client: Arc<Client>,
}

impl PgBulkClient {
    /// Establishes a connection to Postgres. The connection uses TLS if configured in the
    /// supplied [`PgConnectionConfig`].
    pub async fn connect(pg_connection_config: PgConnectionConfig) -> BulkResult<Self> {
        match pg_connection_config.tls.enabled {
            true => PgBulkClient::connect_tls(pg_connection_config).await,
            false => PgBulkClient::connect_no_tls(pg_connection_config).await,
        }
    }

    /// Wraps a client whose connection is driven by the caller.
    ///
    /// The engine never closes the connection of such a client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn connect_no_tls(pg_connection_config: PgConnectionConfig) -> BulkResult<Self> {
        let config: Config = pg_connection_config.with_db();

        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!("successfully connected to postgres without tls");

        Ok(PgBulkClient::from_client(client))
    }

    async fn connect_tls(pg_connection_config: PgConnectionConfig) -> BulkResult<Self> {
        let config: Config = pg_connection_config.with_db();

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader =
            BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        info!("successfully connected to postgres with tls");

        Ok(PgBulkClient::from_client(client))
    }

    /// Checks if the underlying connection is closed.
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn simple_query_rows(&self, statement: &str) -> BulkResult<Vec<SimpleQueryRow>> {
        let messages = self.client.simple_query(statement).await?;

        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    /// Returns the oid of an ordinary or partitioned table.
    async fn table_oid(&self, table_name: &TableName) -> BulkResult<Option<u32>> {
        let query = format!(
            r#"select c.oid
            from pg_class c
            join pg_namespace n on n.oid = c.relnamespace
            where n.nspname = {} and c.relname = {} and c.relkind in ('r', 'p');"#,
            quote_literal(&table_name.schema),
            quote_literal(&table_name.name)
        );

        let rows = self.simple_query_rows(&query).await?;
        match rows.first() {
            Some(row) => Ok(Some(get_row_value::<u32>(row, "oid", table_name)?)),
            None => Ok(None),
        }
    }

    async fn column_schemas(
        &self,
        table_oid: u32,
        table_name: &TableName,
    ) -> BulkResult<Vec<ColumnSchema>> {
        let query = format!(
            r#"select a.attname,
                a.atttypid,
                a.atttypmod,
                a.attnotnull,
                t.typtype,
                t.typname,
                tn.nspname as typnamespace,
                (
                    select k.ord
                    from pg_index i
                    cross join lateral unnest(i.indkey) with ordinality k(attnum, ord)
                    where i.indrelid = a.attrelid and i.indisprimary and k.attnum = a.attnum
                ) as primary_key_position,
                (a.attidentity <> '' or coalesce(pg_get_expr(d.adbin, d.adrelid), '') like 'nextval(%') as generated,
                a.attidentity = 'a' as identity_always
            from pg_attribute a
            join pg_type t on t.oid = a.atttypid
            join pg_namespace tn on tn.oid = t.typnamespace
            left join pg_attrdef d on d.adrelid = a.attrelid and d.adnum = a.attnum
            where a.attrelid = {table_oid}
                and a.attnum > 0
                and not a.attisdropped
                and a.attgenerated = ''
            order by a.attnum;"#
        );

        let mut column_schemas = vec![];
        for row in self.simple_query_rows(&query).await? {
            let name = get_row_value::<String>(&row, "attname", table_name)?;
            let type_oid = get_row_value::<u32>(&row, "atttypid", table_name)?;
            let modifier = get_row_value::<i32>(&row, "atttypmod", table_name)?;
            let not_null = get_row_value::<String>(&row, "attnotnull", table_name)? == "t";
            let primary_key_position = row
                .try_get("primary_key_position")?
                .map(|position| {
                    position.parse::<i32>().map_err(|err| {
                        bulk_error!(
                            ErrorKind::ConversionError,
                            "Column parsing failed",
                            format!(
                                "Failed to parse the primary key position of column '{name}' in table '{table_name}': {err}"
                            )
                        )
                    })
                })
                .transpose()?;
            let generated = get_row_value::<String>(&row, "generated", table_name)? == "t";
            let identity_always =
                get_row_value::<String>(&row, "identity_always", table_name)? == "t";

            let typ = if get_row_value::<String>(&row, "typtype", table_name)? == "e" {
                // Labels are not needed, the kind alone selects the textual encoding.
                Type::new(
                    get_row_value::<String>(&row, "typname", table_name)?,
                    type_oid,
                    Kind::Enum(vec![]),
                    get_row_value::<String>(&row, "typnamespace", table_name)?,
                )
            } else {
                convert_type_oid_to_type(type_oid)
            };

            column_schemas.push(
                ColumnSchema::new(name, typ, modifier, !not_null, primary_key_position)
                    .with_generated(generated, identity_always),
            );
        }

        Ok(column_schemas)
    }
}

impl BulkBackend for PgBulkClient {
    async fn table_schema(&self, table_name: &TableName) -> BulkResult<Option<TableSchema>> {
        let Some(table_oid) = self.table_oid(table_name).await? else {
            debug!(table = %table_name, "table not found");
            return Ok(None);
        };

        let column_schemas = self.column_schemas(table_oid, table_name).await?;

        Ok(Some(TableSchema::new(table_name.clone(), column_schemas)))
    }

    async fn execute(&self, statement: &str) -> BulkResult<u64> {
        let rows = self.client.execute(statement, &[]).await?;

        Ok(rows)
    }

    async fn query(&self, statement: &str) -> BulkResult<Vec<TextRow>> {
        let rows = self.simple_query_rows(statement).await?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|index| row.get(index).map(str::to_string))
                    .collect()
            })
            .collect())
    }

    async fn copy_in(&self, statement: &str, payload: CopyPayload) -> BulkResult<u64> {
        let sink = self.client.copy_in::<_, Bytes>(statement).await?;
        pin_mut!(sink);

        for chunk in payload.chunks {
            sink.send(chunk).await?;
        }

        let rows = sink.finish().await?;

        Ok(rows)
    }
}

/// Extracts and parses a non-null value from a [`SimpleQueryRow`].
fn get_row_value<T: std::str::FromStr>(
    row: &SimpleQueryRow,
    column_name: &str,
    table_name: &TableName,
) -> BulkResult<T>
where
    T::Err: fmt::Debug,
{
    let value = row.try_get(column_name)?.ok_or(bulk_error!(
        ErrorKind::SchemaMismatch,
        "Column not found in catalog row",
        format!("Column '{column_name}' is missing from the catalog row of table '{table_name}'")
    ))?;

    value.parse().map_err(|e: T::Err| {
        bulk_error!(
            ErrorKind::ConversionError,
            "Column parsing failed",
            format!(
                "Failed to parse value from column '{column_name}' in table '{table_name}': {e:?}"
            )
        )
    })
}
