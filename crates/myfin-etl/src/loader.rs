//! PostgreSQL loader for normalized transactions
//!
//! Records are inserted one statement at a time on a single connection. A
//! primary key conflict on `id` means the row was stored by an earlier run;
//! that record is skipped and the loop moves on. Any other database error,
//! including other unique or not-null violations, aborts the load.

use async_trait::async_trait;
use myfin_common::types::Transaction;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgQueryResult};
use sqlx::{ConnectOptions, Connection};
use std::fmt;
use tracing::{debug, error, info};

use crate::config::{DatabaseConfig, TableName};
use crate::error::{EtlError, Result};

/// Why a record was not inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A row with this `id` already exists
    DuplicateKey { id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DuplicateKey { id } => write!(f, "duplicate key '{}'", id),
        }
    }
}

/// Result of a single insert attempt
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Skipped(SkipReason),
    Failed(sqlx::Error),
}

/// Totals for one `insert_all` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub inserted: usize,
    pub skipped: usize,
}

impl LoadReport {
    /// Fold one outcome into the totals; a failure is returned as an error
    pub fn record(&mut self, outcome: InsertOutcome) -> Result<()> {
        self.attempted += 1;
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Skipped(reason) => {
                debug!(%reason, "Skipped record");
                self.skipped += 1;
            },
            InsertOutcome::Failed(err) => return Err(EtlError::Database(err)),
        }
        Ok(())
    }
}

/// Storage side of a sync run
#[async_trait]
pub trait TransactionSink: Send {
    /// Whether `table` exists in the current schema
    async fn table_exists(&mut self, table: &TableName) -> Result<bool>;

    /// Create `table` if it is missing; a no-op otherwise
    async fn ensure_schema(&mut self, table: &TableName) -> Result<()>;

    /// Insert each record individually, skipping primary key conflicts
    async fn insert_all(&mut self, records: &[Transaction], table: &TableName)
        -> Result<LoadReport>;
}

/// Loader owning one PostgreSQL connection for the duration of a run
pub struct PgLoader {
    conn: PgConnection,
}

impl PgLoader {
    /// Open the run's connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        let conn = tokio::time::timeout(config.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                EtlError::Database(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "connecting to {}:{} timed out after {:?}",
                        config.host, config.port, config.connect_timeout
                    ),
                )))
            })??;

        info!(host = %config.host, database = %config.name, "Database connection opened");

        Ok(Self { conn })
    }

    /// Close the connection, flushing the termination message to the server
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connection closed");
        Ok(())
    }

    async fn insert_with(&mut self, sql: &str, pk: &str, record: &Transaction) -> InsertOutcome {
        let result = sqlx::query(sql)
            .bind(&record.id)
            .bind(record.created_at)
            .bind(record.modified_at)
            .bind(record.estimated_date)
            .bind(record.payment_date)
            .bind(&record.recipient_ref)
            .bind(&record.status)
            .bind(&record.user_ref)
            .bind(&record.cod_ref)
            .bind(&record.created_by)
            .bind(&record.transaction_type)
            .bind(&record.frequency_type)
            .bind(&record.amount)
            .bind(record.year_ref)
            .bind(record.month_ref)
            .execute(&mut self.conn)
            .await;

        classify(result, &record.id, pk)
    }
}

#[async_trait]
impl TransactionSink for PgLoader {
    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(table.as_str())
        .fetch_one(&mut self.conn)
        .await?;

        debug!(%table, exists, "Checked table existence");
        Ok(exists)
    }

    async fn ensure_schema(&mut self, table: &TableName) -> Result<()> {
        sqlx::query(&create_table_sql(table))
            .execute(&mut self.conn)
            .await?;

        debug!(%table, "Schema ensured");
        Ok(())
    }

    async fn insert_all(
        &mut self,
        records: &[Transaction],
        table: &TableName,
    ) -> Result<LoadReport> {
        let sql = insert_sql(table);
        let pk = table.primary_key_constraint();
        let mut report = LoadReport::default();

        for record in records {
            let outcome = self.insert_with(&sql, &pk, record).await;
            if let Err(e) = report.record(outcome) {
                error!(id = %record.id, error = %e, "Insert failed, aborting load");
                return Err(e);
            }
        }

        info!(
            %table,
            attempted = report.attempted,
            inserted = report.inserted,
            skipped = report.skipped,
            "Load complete"
        );

        Ok(report)
    }
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ,
            modified_at TIMESTAMPTZ,
            estimated_date TIMESTAMPTZ,
            payment_date TIMESTAMPTZ,
            recipient_ref VARCHAR(255),
            status VARCHAR(255),
            user_ref VARCHAR(255),
            cod_ref VARCHAR(255),
            created_by VARCHAR(255),
            transaction_type VARCHAR(255),
            frequency_type VARCHAR(255),
            amount NUMERIC(10, 2),
            year_ref INTEGER,
            month_ref INTEGER,
            CONSTRAINT {pk} PRIMARY KEY (id)
        )
        "#,
        table = table,
        pk = table.primary_key_constraint(),
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        r#"
        INSERT INTO {table} (
            id, created_at, modified_at, estimated_date, payment_date,
            recipient_ref, status, user_ref, cod_ref, created_by,
            transaction_type, frequency_type, amount, year_ref, month_ref
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
        table = table,
    )
}

fn classify(
    result: std::result::Result<PgQueryResult, sqlx::Error>,
    id: &str,
    pk: &str,
) -> InsertOutcome {
    match result {
        Ok(_) => InsertOutcome::Inserted,
        Err(err) if is_primary_key_conflict(&err, pk) => {
            InsertOutcome::Skipped(SkipReason::DuplicateKey { id: id.to_string() })
        },
        Err(err) => InsertOutcome::Failed(err),
    }
}

/// Unique violation on exactly the primary key constraint
fn is_primary_key_conflict(err: &sqlx::Error, pk: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(pk)
        },
        _ => false,
    }
}
