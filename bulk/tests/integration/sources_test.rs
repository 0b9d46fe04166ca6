use bulk::error::ErrorKind;
use bulk::source::RowSource;
use bulk::test_utils::database::{
    connect_engine, create_customers_table, fetch_customers, spawn_database, test_table_name,
};
use bulk::test_utils::entities::Customer;
use bulk::types::{Cell, DataTable, FieldBag};
use futures::stream;
use serde_json::{Value, json};
use telemetry::init_test_tracing;

const NAMES: [(&str, Option<&str>); 3] = [
    ("ada", Some("ada@example.com")),
    ("grace", None),
    ("tab\tand\nnewline", Some("back\\slash@example.com")),
];

fn bags() -> Vec<FieldBag> {
    NAMES
        .iter()
        .map(|(name, email)| {
            FieldBag::new()
                .with("name", *name)
                .with("email", email.map(Cell::from).unwrap_or(Cell::Null))
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn every_source_shape_loads_the_same_rows() {
    init_test_tracing();
    let database = spawn_database().await;
    let engine = connect_engine(&database).await;
    let options = engine.insert_options();

    let mut records = NAMES
        .iter()
        .map(|(name, email)| Customer::new(*name, *email))
        .collect::<Vec<_>>();
    let mut bags = bags();
    let mut json_rows = NAMES
        .iter()
        .map(|(name, email)| json!({"name": name, "email": email}))
        .collect::<Vec<Value>>();
    let mut table = DataTable::new(["name", "email"]);
    for (name, email) in NAMES {
        table
            .add_row(vec![
                Cell::from(name),
                email.map(Cell::from).unwrap_or(Cell::Null),
            ])
            .unwrap();
    }
    let reader = stream::iter(bags().into_iter().map(Ok));

    let sources = vec![
        ("records", RowSource::records(&mut records)),
        ("bags", RowSource::bags(&mut bags)),
        ("json", RowSource::json(&mut json_rows)),
        ("table", RowSource::table(&mut table)),
        ("reader", RowSource::reader(reader)),
    ];

    let mut outcomes = vec![];
    for (shape, source) in sources {
        let table_name = test_table_name(&format!("customers_{shape}"));
        create_customers_table(&database, &table_name).await;

        let inserted = engine
            .bulk_insert(&table_name, source, &options)
            .await
            .unwrap();
        assert_eq!(inserted, 3, "{shape} source");

        let stored = fetch_customers(&database, &table_name)
            .await
            .into_iter()
            .map(|(_, name, email)| (name, email))
            .collect::<Vec<_>>();
        outcomes.push(stored);
    }

    let expected = NAMES
        .iter()
        .map(|(name, email)| (name.to_string(), email.map(str::to_string)))
        .collect::<Vec<_>>();
    for outcome in outcomes {
        assert_eq!(outcome, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn json_sources_reject_null_elements() {
    init_test_tracing();
    let database = spawn_database().await;
    let table_name = test_table_name("customers");
    create_customers_table(&database, &table_name).await;
    let engine = connect_engine(&database).await;

    let mut json_rows = vec![json!({"name": "ada"}), Value::Null];
    let err = engine
        .bulk_insert(
            &table_name,
            RowSource::json(&mut json_rows),
            &engine.insert_options(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(database.count_rows(&table_name).await.unwrap(), 0);
}
