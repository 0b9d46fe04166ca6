use std::thread;

use bulk::blocking::BulkEngine;
use bulk::error::ErrorKind;
use bulk::source::RowSource;
use bulk::test_utils::database::{
    create_customers_table, fetch_customers, spawn_database, test_table_name,
};
use bulk::test_utils::entities::Customer;
use bulk::types::FieldBag;
use config::shared::{BulkConfig, BulkEngineConfig};
use telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn blocking_engine_runs_outside_of_a_runtime() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;

    let config = BulkEngineConfig {
        pg_connection: database.config.clone(),
        bulk: BulkConfig::default(),
    };
    let worker_table = table_name.clone();
    let (inserted, customers, deleted, missing) = thread::spawn(move || {
        let engine = BulkEngine::connect(&config).unwrap();

        let mut rows = vec![
            FieldBag::new().with("name", "ada"),
            FieldBag::new().with("name", "grace"),
        ];
        let inserted = engine
            .bulk_insert(&worker_table, RowSource::bags(&mut rows), &engine.insert_options())
            .unwrap();

        let mut customers = vec![Customer::new("edsger", None)];
        let options = engine
            .insert_options()
            .with_mappings([("name", "name"), ("email", "email")])
            .with_return_identity(true);
        engine
            .bulk_insert(&worker_table, RowSource::records(&mut customers), &options)
            .unwrap();

        let deleted = engine
            .binary_bulk_delete(
                &worker_table,
                RowSource::keys(customers.iter().filter_map(|customer| customer.id)),
                &engine.delete_options(),
            )
            .unwrap();

        let missing = engine
            .bulk_insert(&worker_table, Option::<RowSource>::None, &engine.insert_options())
            .unwrap_err()
            .kind();

        (inserted, customers, deleted, missing)
    })
    .join()
    .unwrap();

    assert_eq!(inserted, 2);
    assert!(customers[0].id.is_some());
    assert_eq!(deleted, 1);
    assert_eq!(missing, ErrorKind::InvalidInput);

    let names = fetch_customers(&database, &table_name)
        .await
        .into_iter()
        .map(|(_, name, _)| name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["ada", "grace"]);
}
