//! PostgreSQL loader tests
//!
//! Require Docker. Run with:
//!
//! ```bash
//! cargo test -p myfin-etl --test loader_tests -- --ignored --nocapture
//! ```

mod common;

use bigdecimal::BigDecimal;
use chrono::{TimeZone, Utc};
use common::{init_test_tracing, transactions_table, TestPostgres};
use myfin_common::types::Transaction;
use myfin_etl::error::EtlError;
use myfin_etl::loader::{LoadReport, PgLoader, TransactionSink};
use serial_test::serial;
use std::str::FromStr;

fn records(prefix: &str, count: usize) -> Vec<Transaction> {
    (0..count)
        .map(|i| {
            let mut tx = Transaction::new(format!("{}-{}", prefix, i));
            tx.status = Some("paid".to_string());
            tx.amount = Some(BigDecimal::from_str("10.50").unwrap());
            tx.year_ref = Some(2024);
            tx.month_ref = Some(3);
            tx
        })
        .collect()
}

async fn loader_for(pg: &TestPostgres) -> PgLoader {
    PgLoader::connect(&pg.database_config())
        .await
        .expect("Failed to connect loader")
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_table_exists_and_ensure_schema_is_idempotent() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;

    assert!(!loader.table_exists(&table).await.unwrap());

    loader.ensure_schema(&table).await.unwrap();
    assert!(loader.table_exists(&table).await.unwrap());

    // Second call against an existing table is a no-op
    loader.ensure_schema(&table).await.unwrap();
    assert!(loader.table_exists(&table).await.unwrap());

    loader.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_insert_all_twice_keeps_row_count() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let batch = records("tx", 5);

    let first = loader.insert_all(&batch, &table).await.unwrap();
    let second = loader.insert_all(&batch, &table).await.unwrap();

    assert_eq!(first.inserted, 5);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(pg.row_count(&table).await.unwrap(), 5);

    loader.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_conflicting_ids_are_skipped_and_counted() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let batch = records("tx", 10);
    // Three of the ten already stored by an earlier run
    loader.insert_all(&batch[..3], &table).await.unwrap();

    let report = loader.insert_all(&batch, &table).await.unwrap();

    assert_eq!(report.attempted, 10);
    assert_eq!(report.inserted, 7);
    assert_eq!(report.skipped, 3);
    assert_eq!(pg.row_count(&table).await.unwrap(), 10);

    loader.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_duplicate_within_one_batch_is_skipped() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let batch = vec![
        Transaction::new("dup-1"),
        Transaction::new("dup-1"),
        Transaction::new("other"),
    ];

    let report = loader.insert_all(&batch, &table).await.unwrap();

    assert_eq!(
        report,
        LoadReport {
            attempted: 3,
            inserted: 2,
            skipped: 1
        }
    );
    assert_eq!(pg.row_count(&table).await.unwrap(), 2);

    loader.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_values_round_trip_through_columns() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let estimated = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let mut tx = Transaction::new("typed-1");
    tx.estimated_date = Some(estimated);
    tx.amount = Some(BigDecimal::from_str("1234.5").unwrap());
    tx.transaction_type = Some("expense".to_string());

    let report = loader.insert_all(&[tx], &table).await.unwrap();
    assert_eq!(report.inserted, 1);
    loader.close().await.unwrap();

    let mut conn = pg.connect().await.unwrap();
    let (stored_date, stored_amount, stored_type, payment_date): (
        Option<chrono::DateTime<Utc>>,
        Option<BigDecimal>,
        Option<String>,
        Option<chrono::DateTime<Utc>>,
    ) = sqlx::query_as(
        "SELECT estimated_date, amount, transaction_type, payment_date FROM transactions WHERE id = $1",
    )
    .bind("typed-1")
    .fetch_one(&mut conn)
    .await
    .unwrap();

    assert_eq!(stored_date, Some(estimated));
    assert_eq!(stored_amount, Some(BigDecimal::from_str("1234.50").unwrap()));
    assert_eq!(stored_type.as_deref(), Some("expense"));
    assert_eq!(payment_date, None);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_other_unique_violation_is_fatal() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let mut conn = pg.connect().await.unwrap();
    sqlx::query("ALTER TABLE transactions ADD CONSTRAINT transactions_cod_ref_key UNIQUE (cod_ref)")
        .execute(&mut conn)
        .await
        .unwrap();

    let mut first = Transaction::new("a");
    first.cod_ref = Some("SAME".to_string());
    let mut second = Transaction::new("b");
    second.cod_ref = Some("SAME".to_string());

    let err = loader
        .insert_all(&[first, second], &table)
        .await
        .unwrap_err();

    match err {
        EtlError::Database(sqlx::Error::Database(db_err)) => {
            assert_eq!(db_err.constraint(), Some("transactions_cod_ref_key"));
        },
        other => panic!("expected database error, got {:?}", other),
    }
    assert_eq!(pg.row_count(&table).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_oversized_text_is_fatal() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let table = transactions_table();
    let mut loader = loader_for(&pg).await;
    loader.ensure_schema(&table).await.unwrap();

    let mut tx = Transaction::new("long");
    tx.status = Some("x".repeat(256));

    let result = loader.insert_all(&[tx], &table).await;

    assert!(matches!(result, Err(EtlError::Database(_))));
}
