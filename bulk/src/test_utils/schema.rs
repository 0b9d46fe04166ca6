use postgres::schema::{ColumnSchema, TableName, TableSchema};
use tokio_postgres::types::Type;

/// Returns the metadata of `public.customers`.
///
/// `id bigint generated always as identity primary key, name text not null, email text`
pub fn customers_schema() -> TableSchema {
    TableSchema::new(
        TableName::new("public", "customers"),
        vec![
            ColumnSchema::new("id".to_string(), Type::INT8, -1, false, Some(1))
                .with_generated(true, true),
            ColumnSchema::new("name".to_string(), Type::TEXT, -1, false, None),
            ColumnSchema::new("email".to_string(), Type::TEXT, -1, true, None),
        ],
    )
}

/// Returns the metadata of `public.codes`, a table without a primary key.
///
/// `code text not null, label text`
pub fn keyless_schema() -> TableSchema {
    TableSchema::new(
        TableName::new("public", "codes"),
        vec![
            ColumnSchema::new("code".to_string(), Type::TEXT, -1, false, None),
            ColumnSchema::new("label".to_string(), Type::TEXT, -1, true, None),
        ],
    )
}

/// Returns the metadata of `public.sessions`, holding a column without a binary encoding.
///
/// `id bigint generated always as identity primary key, user_name text not null,
/// duration interval`
pub fn sessions_schema() -> TableSchema {
    TableSchema::new(
        TableName::new("public", "sessions"),
        vec![
            ColumnSchema::new("id".to_string(), Type::INT8, -1, false, Some(1))
                .with_generated(true, true),
            ColumnSchema::new("user_name".to_string(), Type::TEXT, -1, false, None),
            ColumnSchema::new("duration".to_string(), Type::INTERVAL, -1, true, None),
        ],
    )
}
