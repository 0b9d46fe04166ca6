use std::str::FromStr;

use bigdecimal::BigDecimal;
use bulk::error::ErrorKind;
use bulk::operations::InsertOptions;
use bulk::source::RowSource;
use bulk::test_utils::database::{
    connect_engine, create_customers_table, database_client, fetch_customers, spawn_database,
    test_table_name,
};
use bulk::types::{Cell, FieldBag};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use telemetry::init_test_tracing;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn binary_insert_encodes_every_supported_type() {
    init_test_tracing();
    let database = spawn_database().await;
    database
        .run_sql("create type test.mood as enum ('sad', 'ok', 'happy')")
        .await
        .unwrap();
    let table_name = test_table_name("samples");
    database
        .create_table(
            &table_name,
            true,
            &[
                ("flag", "bool"),
                ("small", "int2"),
                ("amount", "numeric(12, 3)"),
                ("ratio", "float8"),
                ("day", "date"),
                ("seen_at", "timestamptz"),
                ("token", "uuid"),
                ("payload", "jsonb"),
                ("raw", "bytea"),
                ("note", "text"),
                ("mood", "test.mood"),
            ],
        )
        .await
        .unwrap();
    let engine = connect_engine(&database).await;

    let token = Uuid::new_v4();
    let mut rows = vec![
        FieldBag::new()
            .with("flag", true)
            .with("small", 7i64)
            .with("amount", BigDecimal::from_str("1234.5").unwrap())
            .with("ratio", 0.25f64)
            .with("day", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
            .with("seen_at", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
            .with("token", token)
            .with("payload", json!({"tags": ["a", "b"], "count": 2}))
            .with("raw", vec![0u8, 1, 255])
            .with("note", "tab\there")
            .with("mood", "happy"),
        FieldBag::new()
            .with("flag", Cell::Null)
            .with("small", Cell::Null)
            .with("amount", Cell::Null)
            .with("ratio", Cell::Null)
            .with("day", Cell::Null)
            .with("seen_at", Cell::Null)
            .with("token", Cell::Null)
            .with("payload", Cell::Null)
            .with("raw", Cell::Null)
            .with("note", Cell::Null)
            .with("mood", Cell::Null),
    ];
    let inserted = engine
        .binary_bulk_insert(&table_name, RowSource::bags(&mut rows), &InsertOptions::new())
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let stored = database_client(&database)
        .query(
            &format!(
                "select flag::text, small::text, amount::text, ratio::text, day::text, \
                 (seen_at at time zone 'UTC')::text, token::text, payload::text, \
                 encode(raw, 'hex'), note, mood::text from {} order by id",
                table_name.as_quoted_identifier()
            ),
            &[],
        )
        .await
        .unwrap();
    let values = |index: usize| {
        (0..11)
            .map(|column| stored[index].get::<_, Option<String>>(column))
            .collect::<Vec<_>>()
    };

    let token = token.to_string();
    assert_eq!(
        values(0),
        vec![
            Some("true"),
            Some("7"),
            Some("1234.500"),
            Some("0.25"),
            Some("2024-02-29"),
            Some("2024-03-01 12:30:00"),
            Some(token.as_str()),
            Some(r#"{"tags": ["a", "b"], "count": 2}"#),
            Some("0001ff"),
            Some("tab\there"),
            Some("happy"),
        ]
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect::<Vec<_>>()
    );
    assert_eq!(values(1), vec![None; 11]);
}

#[tokio::test(flavor = "multi_thread")]
async fn binary_insert_accepts_text_for_typed_columns() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("events");
    database
        .create_table(
            &table_name,
            true,
            &[("day", "date not null"), ("token", "uuid not null")],
        )
        .await
        .unwrap();
    let engine = connect_engine(&database).await;

    let mut rows = vec![
        FieldBag::new()
            .with("day", "2024-01-15")
            .with("token", "6f1c2a52-0d1f-4c5e-9a3c-0a8f3f3f3f3f"),
    ];
    let inserted = engine
        .binary_bulk_insert(&table_name, RowSource::bags(&mut rows), &InsertOptions::new())
        .await
        .unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn binary_insert_rejects_unencodable_values_before_loading() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = vec![
        FieldBag::new().with("name", "ada"),
        FieldBag::new().with("name", 12i64),
    ];
    let err = engine
        .binary_bulk_insert(&table_name, RowSource::bags(&mut rows), &InsertOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    assert!(fetch_customers(&database, &table_name).await.is_empty());
}
