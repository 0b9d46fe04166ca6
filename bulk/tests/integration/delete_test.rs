use bulk::error::ErrorKind;
use bulk::operations::DeleteOptions;
use bulk::source::RowSource;
use bulk::test_utils::database::{
    connect_engine, create_customers_table, fetch_customers, spawn_database, test_table_name,
};
use bulk::types::{Cell, FieldBag};
use postgres::schema::TableName;
use postgres::tokio::test_utils::PgDatabase;
use telemetry::init_test_tracing;

async fn seed_customers(database: &PgDatabase, table_name: &TableName, count: usize) -> Vec<i64> {
    create_customers_table(database, table_name).await;
    for index in 0..count {
        let name = format!("customer {index}");
        let email = format!("customer{index}@example.com");
        database
            .insert_values(table_name, &["name", "email"], &[&name, &email])
            .await
            .unwrap();
    }

    fetch_customers(database, table_name)
        .await
        .into_iter()
        .map(|(id, _, _)| id)
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_every_matched_row() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    let ids = seed_customers(&database, &table_name, 100).await;
    let engine = connect_engine(&database).await;

    let mut rows = ids
        .iter()
        .map(|id| FieldBag::new().with("id", *id).with("name", "ignored"))
        .collect::<Vec<_>>();
    let deleted = engine
        .bulk_delete(&table_name, RowSource::bags(&mut rows), &engine.delete_options())
        .await
        .unwrap();

    assert_eq!(deleted, 100);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_keys_count_once() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    let ids = seed_customers(&database, &table_name, 3).await;
    let engine = connect_engine(&database).await;

    let mut rows = vec![
        FieldBag::new().with("id", ids[0]),
        FieldBag::new().with("id", ids[0]),
        FieldBag::new().with("id", ids[1]),
    ];
    let deleted = engine
        .bulk_delete(
            &table_name,
            RowSource::bags(&mut rows),
            &DeleteOptions::new().with_batch_size(1),
        )
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn qualifiers_replace_the_primary_key() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    seed_customers(&database, &table_name, 4).await;
    let engine = connect_engine(&database).await;

    // The ids do not exist, only the emails match.
    let mut rows = vec![
        FieldBag::new()
            .with("id", -1i64)
            .with("email", "customer1@example.com"),
        FieldBag::new()
            .with("id", -2i64)
            .with("email", "customer3@example.com"),
    ];
    let deleted = engine
        .bulk_delete(
            &table_name,
            RowSource::bags(&mut rows),
            &DeleteOptions::new().with_qualifiers(["email"]),
        )
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    let remaining = fetch_customers(&database, &table_name)
        .await
        .into_iter()
        .map(|(_, name, _)| name)
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec!["customer 0", "customer 2"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn primary_key_values_delete_through_the_binary_path() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    let ids = seed_customers(&database, &table_name, 10).await;
    let engine = connect_engine(&database).await;

    let deleted = engine
        .binary_bulk_delete(
            &table_name,
            RowSource::keys(ids[..5].iter().copied()),
            &engine.delete_options(),
        )
        .await
        .unwrap();

    assert_eq!(deleted, 5);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn keyless_destination_needs_qualifiers() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("codes");
    database
        .create_table(&table_name, false, &[("code", "text not null"), ("label", "text")])
        .await
        .unwrap();
    database
        .insert_values(&table_name, &["code", "label"], &[&"a", &None::<String>])
        .await
        .unwrap();
    let engine = connect_engine(&database).await;

    let mut rows = vec![FieldBag::new().with("code", "a").with("label", Cell::Null)];
    let err = engine
        .bulk_delete(&table_name, RowSource::bags(&mut rows), &engine.delete_options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);

    // Null labels match each other through the qualifier predicate.
    let deleted = engine
        .bulk_delete(
            &table_name,
            RowSource::bags(&mut rows),
            &DeleteOptions::new().with_qualifiers(["code", "label"]),
        )
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_source_is_rejected_without_touching_the_destination() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    seed_customers(&database, &table_name, 2).await;
    let engine = connect_engine(&database).await;

    let err = engine
        .bulk_delete(&table_name, Option::<RowSource>::None, &engine.delete_options())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 2);
}
