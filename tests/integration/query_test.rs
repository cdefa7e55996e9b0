//! End-to-end facade tests against in-memory SQLite.
//!
//! Each test gets its own database holding the `test01` table.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use db_query::db::{DatabaseBackend, SqliteClient};
use db_query::{params, DbError, DbQuery, Value};
use pretty_assertions::assert_eq;
use serde::Deserialize;

const C1: &str = "foo";
const C2: i64 = 1;
const C3: i64 = i64::MAX;
const C4: f64 = 0.23;
const NUM_OF_COLUMNS: usize = 5;
const BATCH_LENGTH: i64 = 5;

#[derive(Debug, Deserialize, PartialEq)]
struct Test01 {
    c0: NaiveDateTime,
    c1: String,
    c2: i32,
    c3: i64,
    c4: f64,
}

fn c0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 7, 21)
        .unwrap()
        .and_hms_milli_opt(13, 10, 30, 123)
        .unwrap()
}

fn add_days(ts: NaiveDateTime, days: i64) -> NaiveDateTime {
    ts + Duration::days(days)
}

async fn setup() -> DbQuery {
    let client = SqliteClient::in_memory().await.unwrap();
    let dbq = DbQuery::from_client(Box::new(client));
    dbq.update("DROP TABLE IF EXISTS test01").await.unwrap();
    dbq.update("CREATE TABLE test01 (C0 TIMESTAMP, C1 VARCHAR, C2 INTEGER, C3 BIGINT, C4 DOUBLE)")
        .await
        .unwrap();
    dbq.select("SELECT * FROM test01").await.unwrap();
    dbq
}

fn assert_row(result: &db_query::QueryResult, row: usize, i: i64) {
    assert_eq!(result.get(row, "C0").unwrap(), &Value::Timestamp(add_days(c0(), i)));
    assert_eq!(
        result.get(row, "C1").unwrap().as_str(),
        Some(format!("{C1}{}", if i == 0 { String::new() } else { i.to_string() }).as_str())
    );
    assert_eq!(result.get(row, "C2").unwrap().as_i64(), Some(C2 + i));
    assert_eq!(result.get(row, "C3").unwrap().as_i64(), Some(C3 - i));
    let c4 = result.get(row, "C4").unwrap().as_f64().unwrap();
    assert!((c4 - (C4 + i as f64)).abs() < 0.01, "C4 was {c4}");
}

#[tokio::test]
async fn test_insert_and_select() {
    let dbq = setup().await;
    assert_eq!(dbq.backend(), DatabaseBackend::Sqlite);

    dbq.update_substituted(
        "INSERT INTO test01 (C0, C1, C2, C3, C4) SELECT ? AS C0, ? AS C1, ? AS C2, ? AS C3, ? AS C4",
        &params![c0(), C1, C2, C3, C4],
    )
    .await
    .unwrap();

    let result = dbq.select("SELECT C0, C1, C2, C3, C4 FROM test01").await.unwrap();

    assert_eq!(result.size(), 1);
    assert_eq!(result.column_count(), NUM_OF_COLUMNS);
    assert_eq!(result.column_names(), vec!["C0", "C1", "C2", "C3", "C4"]);
    assert_eq!(result.type_names().len(), NUM_OF_COLUMNS);
    assert_eq!(
        result.class_names(),
        vec!["NaiveDateTime", "String", "i64", "i64", "f64"]
    );
    assert_row(&result, 0, 0);
}

#[tokio::test]
async fn test_query_delete() {
    let dbq = setup().await;

    dbq.update_with(
        "INSERT INTO test01 (C0, C1, C2, C3, C4) VALUES (?, ?, ?, ?, ?)",
        &params![c0(), C1, C2, C3, C4],
    )
    .await
    .unwrap();

    assert_eq!(dbq.count("SELECT count(*) FROM test01").await.unwrap(), 1);
    assert_eq!(dbq.update("DELETE FROM test01").await.unwrap(), 1);
    assert_eq!(dbq.count("SELECT count(*) FROM test01").await.unwrap(), 0);
}

#[tokio::test]
async fn test_multiple_inserts() {
    let dbq = setup().await;

    let mut params = Vec::new();
    for i in 0..5 {
        let c1 = if i == 0 { C1.to_string() } else { format!("{C1}{i}") };
        params.extend(params![
            add_days(c0(), i),
            c1,
            C2 + i,
            C3 - i,
            C4 + i as f64
        ]);
    }
    let placeholders = vec!["(?, ?, ?, ?, ?)"; 5].join(", ");
    let inserted = dbq
        .update_with(
            &format!("INSERT INTO test01 (C0, C1, C2, C3, C4) VALUES {placeholders}"),
            &params,
        )
        .await
        .unwrap();
    assert_eq!(inserted, 5);

    assert_eq!(dbq.count("SELECT count(*) FROM test01").await.unwrap(), 5);

    let result = dbq.select("SELECT * FROM test01 ORDER BY C0").await.unwrap();
    assert_eq!(result.size(), 5);
    for i in 0..5 {
        assert_row(&result, i as usize, i);
    }
}

#[tokio::test]
async fn test_batch() {
    let dbq = setup().await;

    let mut queries =
        vec!["CREATE TABLE test05 (C0 TIMESTAMP, C1 VARCHAR, C2 INTEGER, C3 BIGINT, C4 DOUBLE)"
            .to_string()];
    for i in 0..BATCH_LENGTH {
        let c1 = if i == 0 { C1.to_string() } else { format!("{C1}{i}") };
        let insert = db_query::Statement::new(
            "INSERT INTO test05 (C0, C1, C2, C3, C4) VALUES (?, ?, ?, ?, ?)",
        )
        .with_params(params![add_days(c0(), i), c1, C2 + i, C3 - i, C4 + i as f64])
        .substitute(DatabaseBackend::Sqlite)
        .unwrap();
        queries.push(insert.sql().to_string());
    }

    let counts = dbq.batch(queries).await.unwrap();
    assert_eq!(counts.len(), 1 + BATCH_LENGTH as usize);
    assert_eq!(counts[1..], [1; BATCH_LENGTH as usize]);

    let result = dbq.select("SELECT * FROM test05 ORDER BY C0").await.unwrap();
    assert_eq!(result.size(), BATCH_LENGTH as usize);
    for i in 0..BATCH_LENGTH {
        assert_row(&result, i as usize, i);
    }
}

#[tokio::test]
async fn test_get_entity_list() {
    let dbq = setup().await;

    let param_sets: Vec<Vec<Value>> = (0..2)
        .map(|i| {
            let c1 = if i == 0 { C1.to_string() } else { format!("{C1}{i}") };
            params![add_days(c0(), i), c1, C2 + i, C3 - i, C4 + i as f64]
        })
        .collect();
    dbq.batch_with(
        "INSERT INTO test01 (C0, C1, C2, C3, C4) VALUES (?, ?, ?, ?, ?)",
        &param_sets,
    )
    .await
    .unwrap();

    let entities: Vec<Test01> = dbq
        .entity_list("SELECT * FROM test01 ORDER BY C0")
        .await
        .unwrap();

    assert_eq!(
        entities,
        vec![
            Test01 {
                c0: c0(),
                c1: "foo".to_string(),
                c2: 1,
                c3: i64::MAX,
                c4: 0.23,
            },
            Test01 {
                c0: add_days(c0(), 1),
                c1: "foo1".to_string(),
                c2: 2,
                c3: i64::MAX - 1,
                c4: 1.23,
            },
        ]
    );
}

#[tokio::test]
async fn test_invalid_references() {
    let dbq = setup().await;
    dbq.update_with(
        "INSERT INTO test01 (C0, C1, C2, C3, C4) VALUES (?, ?, ?, ?, ?)",
        &params![c0(), C1, C2, C3, C4],
    )
    .await
    .unwrap();
    let result = dbq.select("SELECT * FROM test01").await.unwrap();

    let err = result.get(1, "C1").unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: Invalid row number [1]");

    let err = result.get(0, "C9").unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: Invalid column name <C9>");

    let err = result.get(0, " ").unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: Invalid column name");

    let err = result.get(0, 9usize).unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: Invalid column number [9]");

    assert!(matches!(result.row(3), Err(DbError::InvalidArgument(_))));
    assert_eq!(result.get(0, 1usize).unwrap().as_str(), Some(C1));
}

#[tokio::test]
async fn test_empty_result_reports_columns() {
    let dbq = setup().await;
    let result = dbq.select("SELECT C1, C2 FROM test01").await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["C1", "C2"]);
    assert_eq!(result.class_names(), vec!["String", "i64"]);
    assert_eq!(result.to_string(), "COLUMNS:\n[C1, C2]\nRECORDS:");
}

#[tokio::test]
async fn test_file_backed_database_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("app.db").display());
    let config = db_query::DataSourceConfig::from_url(&url).unwrap();

    let dbq = DbQuery::connect(&config).await.unwrap();
    dbq.batch([
        "CREATE TABLE notes (id INTEGER, body TEXT)",
        "INSERT INTO notes VALUES (1, 'kept')",
    ])
    .await
    .unwrap();
    dbq.close().await.unwrap();

    let dbq = DbQuery::connect(&config).await.unwrap();
    let result = dbq.select("SELECT body FROM notes").await.unwrap();
    assert_eq!(result.get(0, "body").unwrap().as_str(), Some("kept"));
    dbq.close().await.unwrap();
}
