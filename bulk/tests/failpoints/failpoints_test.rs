use bulk::error::ErrorKind;
use bulk::failpoints::{RECONCILE_BEFORE_READ_BACK, STAGING_AFTER_CREATE, TRANSFER_BEFORE_BATCH};
use bulk::operations::{DeleteOptions, InsertOptions};
use bulk::source::RowSource;
use bulk::staging::StagingStrategy;
use bulk::test_utils::database::{
    connect_engine, count_staging_relations, create_customers_table, fetch_customers,
    spawn_database, test_table_name,
};
use bulk::test_utils::failpoints::FailPointScenario;
use bulk::types::FieldBag;
use config::shared::BulkConfig;
use telemetry::init_test_tracing;

fn named(count: usize) -> Vec<FieldBag> {
    (0..count)
        .map(|index| FieldBag::new().with("name", format!("customer {index}")))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_after_staging_creation_drops_the_staging_relation() {
    init_test_tracing();
    let _scenario = FailPointScenario::setup(&[(STAGING_AFTER_CREATE, "return(transfer)")]);

    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    database
        .insert_values(&table_name, &["name"], &[&"ada"])
        .await
        .unwrap();
    let engine = connect_engine(&database).await;

    let mut rows = vec![FieldBag::new().with("id", 1i64)];
    let err = engine
        .bulk_delete(
            &table_name,
            RowSource::bags(&mut rows),
            &DeleteOptions::new().with_staging(StagingStrategy::Physical),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 1);
    assert_eq!(
        count_staging_relations(&database, BulkConfig::DEFAULT_STAGING_PREFIX).await,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_read_back_keeps_the_inserted_rows() {
    init_test_tracing();
    let _scenario =
        FailPointScenario::setup(&[(RECONCILE_BEFORE_READ_BACK, "return(reconcile)")]);

    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = named(3);
    let err = engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut rows),
            &InsertOptions::new()
                .with_return_identity(true)
                .with_staging(StagingStrategy::Physical),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReconciliationFailure);
    assert_eq!(fetch_customers(&database, &table_name).await.len(), 3);
    assert!(rows.iter().all(|row| row.get("id").is_none()));
    assert_eq!(
        count_staging_relations(&database, BulkConfig::DEFAULT_STAGING_PREFIX).await,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_batch_keeps_the_batches_loaded_before() {
    init_test_tracing();
    let _scenario = FailPointScenario::setup(&[(TRANSFER_BEFORE_BATCH, "1*off->return(transfer)")]);

    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = named(4);
    let err = engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut rows),
            &InsertOptions::new().with_batch_size(2),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    let names = fetch_customers(&database, &table_name)
        .await
        .into_iter()
        .map(|(_, name, _)| name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["customer 0", "customer 1"]);
}
