//! PostgreSQL integration tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use chrono::NaiveDate;
use db_query::config::DataSourceConfig;
use db_query::{params, DbError, DbQuery, Value};
use pretty_assertions::assert_eq;
use serde::Deserialize;

/// Helper to create a facade over the test database.
async fn get_test_query() -> Option<DbQuery> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = DataSourceConfig::from_url(&url).ok()?;
    DbQuery::connect(&config).await.ok()
}

#[derive(Debug, Deserialize, PartialEq)]
struct Event {
    id: i64,
    title: String,
    starts_on: NaiveDate,
}

#[tokio::test]
async fn test_round_trip_in_temp_table() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    dbq.batch([
        "CREATE TEMP TABLE dbq_events (id INT8, title TEXT, starts_on DATE)",
        "INSERT INTO dbq_events VALUES (1, 'launch', DATE '2016-07-21')",
    ])
    .await
    .unwrap();

    let day = NaiveDate::from_ymd_opt(2016, 7, 22).unwrap();
    let inserted = dbq
        .update_with(
            "INSERT INTO dbq_events VALUES (?, ?, ?)",
            &params![2, "review", day],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let result = dbq
        .select("SELECT id, title, starts_on FROM dbq_events ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.type_names(), vec!["INT8", "TEXT", "DATE"]);
    assert_eq!(result.class_names(), vec!["i64", "String", "NaiveDate"]);
    assert_eq!(result.get(1, "starts_on").unwrap(), &Value::Date(day));

    let events: Vec<Event> = dbq
        .entity_list_with("SELECT * FROM dbq_events WHERE id > ?", &params![1])
        .await
        .unwrap();
    assert_eq!(
        events,
        vec![Event {
            id: 2,
            title: "review".to_string(),
            starts_on: day,
        }]
    );

    assert_eq!(dbq.count("SELECT count(*) FROM dbq_events").await.unwrap(), 2);

    dbq.close().await.unwrap();
}

#[tokio::test]
async fn test_substituted_literals() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = dbq
        .select_substituted(
            "SELECT ? AS quoted, ? AS bytes, ? AS nothing",
            &params!["it's", vec![0xdeu8, 0xad], None::<i64>],
        )
        .await
        .unwrap();

    assert_eq!(result.get(0, "quoted").unwrap().as_str(), Some("it's"));
    assert_eq!(result.get(0, "bytes").unwrap().as_bytes(), Some(&[0xde, 0xad][..]));
    assert!(result.get(0, "nothing").unwrap().is_null());

    dbq.close().await.unwrap();
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    dbq.update("CREATE TEMP TABLE dbq_batch (id INT4 PRIMARY KEY)")
        .await
        .unwrap();
    let err = dbq
        .batch_with(
            "INSERT INTO dbq_batch VALUES (?)",
            &[params![1], params![1], params![2]],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Database(_)));

    assert_eq!(dbq.count("SELECT count(*) FROM dbq_batch").await.unwrap(), 1);

    dbq.close().await.unwrap();
}

#[tokio::test]
async fn test_numeric_uuid_and_time_columns() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    dbq.batch([
        "CREATE TEMP TABLE dbq_payments (id INT8, amount NUMERIC(10, 2), ref UUID, paid_at TIME, qty INT4)",
        "INSERT INTO dbq_payments VALUES \
         (1, 12.50, 'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11', '09:30:00', 3), \
         (2, 0.25, 'b1ffcd00-0d1c-4f09-8c7e-7cc0ce491b22', '17:45:10', 4)",
    ])
    .await
    .unwrap();

    let result = dbq
        .select("SELECT amount, ref, paid_at FROM dbq_payments ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.type_names(), vec!["NUMERIC", "UUID", "TIME"]);
    assert_eq!(result.class_names(), vec!["Decimal", "String", "String"]);
    assert_eq!(
        result.rows[0],
        vec![
            Value::Decimal("12.50".to_string()),
            Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"),
            Value::from("09:30:00"),
        ]
    );

    // sum(INT4) is INT8, sum(INT8) is NUMERIC
    assert_eq!(dbq.count("SELECT sum(qty) FROM dbq_payments").await.unwrap(), 7);
    assert_eq!(dbq.count("SELECT sum(id) FROM dbq_payments").await.unwrap(), 3);

    let err = dbq
        .count("SELECT sum(amount) FROM dbq_payments")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query error: Count query returned a non-integer value: 12.75"
    );

    let matched = dbq
        .count_with(
            "SELECT count(*) FROM dbq_payments WHERE amount = ?",
            &[Value::decimal("0.25").unwrap()],
        )
        .await
        .unwrap();
    assert_eq!(matched, 1);
}

#[tokio::test]
async fn test_null_parameter_into_integer_column() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    dbq.update("CREATE TEMP TABLE dbq_notes (id INT8, amount INT4, note TEXT)")
        .await
        .unwrap();
    dbq.update_with(
        "INSERT INTO dbq_notes VALUES (?, ?, ?)",
        &params![1, Value::Null, Value::Null],
    )
    .await
    .unwrap();

    let result = dbq
        .select("SELECT id, amount, note FROM dbq_notes")
        .await
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(1), Value::Null, Value::Null]]
    );
}

#[tokio::test]
async fn test_jsonb_question_mark_operator_without_params() {
    let Some(dbq) = get_test_query().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = dbq
        .select(r#"SELECT '{"a": 1}'::jsonb ? 'a' AS has_a"#)
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Bool(true)]]);
}
