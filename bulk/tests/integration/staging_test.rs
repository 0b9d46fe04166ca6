use bulk::error::ErrorKind;
use bulk::operations::{DeleteOptions, InsertOptions};
use bulk::source::RowSource;
use bulk::staging::StagingStrategy;
use bulk::test_utils::database::{
    connect_engine, count_staging_relations, create_customers_table, fetch_customers,
    spawn_database, test_table_name,
};
use bulk::types::FieldBag;
use config::shared::BulkConfig;
use telemetry::init_test_tracing;

const STAGING_PREFIX: &str = BulkConfig::DEFAULT_STAGING_PREFIX;

fn named(count: usize) -> Vec<FieldBag> {
    (0..count)
        .map(|index| FieldBag::new().with("name", format!("customer {index}")))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn no_staging_relation_survives_an_operation() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    for staging in [StagingStrategy::SessionTemporary, StagingStrategy::Physical] {
        let mut rows = named(20);
        engine
            .bulk_insert(
                &table_name,
                RowSource::bags(&mut rows),
                &InsertOptions::new()
                    .with_return_identity(true)
                    .with_staging(staging),
            )
            .await
            .unwrap();
        assert_eq!(count_staging_relations(&database, STAGING_PREFIX).await, 0);

        let deleted = engine
            .bulk_delete(
                &table_name,
                RowSource::bags(&mut rows),
                &DeleteOptions::new().with_staging(staging),
            )
            .await
            .unwrap();
        assert_eq!(deleted, 20);
        assert_eq!(count_staging_relations(&database, STAGING_PREFIX).await, 0);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_physical_deletes_do_not_collide() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut rows = named(400);
    engine
        .bulk_insert(
            &table_name,
            RowSource::bags(&mut rows),
            &InsertOptions::new().with_return_identity(true),
        )
        .await
        .unwrap();

    let mut handles = vec![];
    for chunk in rows.chunks(100) {
        let engine = connect_engine(&database).await;
        let table_name = table_name.clone();
        let mut chunk = chunk.to_vec();
        handles.push(tokio::spawn(async move {
            engine
                .bulk_delete(
                    &table_name,
                    RowSource::bags(&mut chunk),
                    &DeleteOptions::new()
                        .with_staging(StagingStrategy::Physical)
                        .with_batch_size(10),
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 100);
    }
    assert!(fetch_customers(&database, &table_name).await.is_empty());
    assert_eq!(count_staging_relations(&database, STAGING_PREFIX).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_load_drops_the_staging_relation() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    for staging in [StagingStrategy::SessionTemporary, StagingStrategy::Physical] {
        let mut rows = vec![
            FieldBag::new().with("id", "1"),
            FieldBag::new().with("id", "abc"),
        ];
        let err = engine
            .bulk_delete(
                &table_name,
                RowSource::bags(&mut rows),
                &DeleteOptions::new().with_staging(staging),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransferFailure);
        assert_eq!(count_staging_relations(&database, STAGING_PREFIX).await, 0);
    }

    // The session stays usable after a failed operation.
    let mut rows = named(2);
    let inserted = engine
        .bulk_insert(&table_name, RowSource::bags(&mut rows), &InsertOptions::new())
        .await
        .unwrap();
    assert_eq!(inserted, 2);
}
