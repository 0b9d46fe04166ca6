use bulk::error::ErrorKind;
use bulk::mapping::ColumnMapping;
use bulk::operations::{IdentityBehavior, InsertOptions};
use bulk::source::RowSource;
use bulk::test_utils::database::{
    connect_engine, create_customers_table, fetch_customers, spawn_database, test_table_name,
};
use bulk::types::{Cell, FieldBag};
use telemetry::init_test_tracing;

fn customers(count: usize) -> Vec<FieldBag> {
    (0..count)
        .map(|index| {
            let email = if index % 3 == 0 {
                Cell::Null
            } else {
                Cell::from(format!("customer{index}@example.com"))
            };

            FieldBag::new()
                .with("name", format!("customer {index}"))
                .with("email", email)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_loads_every_row() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = customers(1000);
    let inserted = engine
        .bulk_insert(&table_name, RowSource::bags(&mut rows), &engine.insert_options())
        .await
        .unwrap();

    assert_eq!(inserted, 1000);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 1000);

    let stored = fetch_customers(&database, &table_name).await;
    assert_eq!(stored[0].1, "customer 0");
    assert_eq!(stored[0].2, None);
    assert_eq!(stored[1].2.as_deref(), Some("customer1@example.com"));
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_size_does_not_change_the_outcome() {
    init_test_tracing();
    let database = spawn_database().await;
    let engine = connect_engine(&database).await;

    let mut outcomes = vec![];
    for (index, batch_size) in [None, Some(1), Some(7), Some(1000)].into_iter().enumerate() {
        let table_name = test_table_name(&format!("customers_{index}"));
        create_customers_table(&database, &table_name).await;

        let mut options = engine.insert_options();
        options.batch_size = batch_size;
        let mut rows = customers(50);
        let inserted = engine
            .bulk_insert(&table_name, RowSource::bags(&mut rows), &options)
            .await
            .unwrap();
        assert_eq!(inserted, 50);

        let stored = fetch_customers(&database, &table_name)
            .await
            .into_iter()
            .map(|(_, name, email)| (name, email))
            .collect::<Vec<_>>();
        outcomes.push(stored);
    }

    assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test(flavor = "multi_thread")]
async fn swapped_mapping_leaves_destination_unchanged() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = vec![FieldBag::new().with("identifier", 1i64).with("full_name", "ada")];
    let options = InsertOptions::new()
        .with_identity_behavior(IdentityBehavior::KeepIdentity)
        .with_mappings([
            ColumnMapping::new("identifier", "name"),
            ColumnMapping::new("full_name", "id"),
        ]);

    let err = engine
        .bulk_insert(&table_name, RowSource::bags(&mut rows), &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_destination_is_reported_before_loading() {
    init_test_tracing();
    let database = spawn_database().await;
    let engine = connect_engine(&database).await;

    let mut rows = customers(3);
    let err = engine
        .bulk_insert(
            &test_table_name("missing"),
            RowSource::bags(&mut rows),
            &engine.insert_options(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingRelation);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_source_inserts_nothing() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows: Vec<FieldBag> = vec![];
    let inserted = engine
        .bulk_insert(&table_name, RowSource::bags(&mut rows), &engine.insert_options())
        .await
        .unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn kept_identities_do_not_collide_with_generated_ones() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut kept = vec![
        FieldBag::new().with("id", 100i64).with("name", "ada"),
        FieldBag::new().with("id", 200i64).with("name", "grace"),
    ];
    let options = InsertOptions::new().with_identity_behavior(IdentityBehavior::KeepIdentity);
    engine
        .bulk_insert(&table_name, RowSource::bags(&mut kept), &options)
        .await
        .unwrap();

    let mut generated = vec![FieldBag::new().with("id", 1i64).with("name", "edsger")];
    engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut generated),
            &InsertOptions::default(),
        )
        .await
        .unwrap();

    let ids = fetch_customers(&database, &table_name)
        .await
        .into_iter()
        .map(|(id, name, _)| (id, name))
        .collect::<Vec<_>>();
    assert_eq!(ids[0], (100, "ada".to_string()));
    assert_eq!(ids[1], (200, "grace".to_string()));
    assert!(ids[2].0 > 200);
    assert_eq!(ids[2].1, "edsger");
}
