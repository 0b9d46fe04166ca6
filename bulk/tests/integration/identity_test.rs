use bulk::operations::{IdentityBehavior, InsertOptions};
use bulk::source::RowSource;
use bulk::staging::StagingStrategy;
use bulk::test_utils::database::{
    connect_engine, count_staging_relations, create_customers_table, fetch_customers,
    spawn_database, test_table_name,
};
use bulk::test_utils::entities::Customer;
use bulk::types::{Cell, FieldBag};
use telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn returned_identities_follow_input_order() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = (0..250)
        .map(|index| FieldBag::new().with("name", format!("customer {index}")))
        .collect::<Vec<_>>();
    let inserted = engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut rows),
            &InsertOptions::new()
                .with_return_identity(true)
                .with_batch_size(32),
        )
        .await
        .unwrap();
    assert_eq!(inserted, 250);

    let stored = fetch_customers(&database, &table_name).await;
    assert_eq!(stored.len(), 250);
    for (id, name, _) in stored {
        let row = rows
            .iter()
            .find(|row| row.get("name") == Some(&Cell::String(name.clone())))
            .unwrap();
        assert_eq!(row.get("id"), Some(&Cell::I64(id)));
    }
    assert_eq!(count_staging_relations(&database, "bulk_staging_").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn entities_receive_their_generated_keys() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    database
        .insert_values(&table_name, &["name"], &[&"existing"])
        .await
        .unwrap();
    let engine = connect_engine(&database).await;

    let mut customers = vec![
        Customer::new("ada", Some("ada@example.com")),
        Customer::new("grace", None),
        Customer::new("edsger", Some("edsger@example.com")),
    ];
    let options = InsertOptions::new()
        .with_mappings([("name", "name"), ("email", "email"), ("id", "id")])
        .with_return_identity(true)
        .with_staging(StagingStrategy::Physical);
    let inserted = engine
        .bulk_insert(&table_name, RowSource::records(&mut customers), &options)
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let stored = fetch_customers(&database, &table_name).await;
    let expected = stored[1..]
        .iter()
        .map(|(id, name, email)| Customer {
            id: Some(*id),
            name: name.clone(),
            email: email.clone(),
        })
        .collect::<Vec<_>>();
    assert_eq!(customers, expected);
    assert!(customers.iter().all(|customer| customer.id > Some(1)));
    assert_eq!(count_staging_relations(&database, "bulk_staging_").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn kept_identities_are_returned_unchanged() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = vec![
        FieldBag::new().with("id", 40i64).with("name", "ada"),
        FieldBag::new().with("id", 41i64).with("name", "grace"),
    ];
    let inserted = engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut rows),
            &InsertOptions::new().with_identity_behavior(IdentityBehavior::KeepIdentity),
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let ids = fetch_customers(&database, &table_name)
        .await
        .into_iter()
        .map(|(id, _, _)| id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![40, 41]);
    assert_eq!(rows[0].get("id"), Some(&Cell::I64(40)));
}
