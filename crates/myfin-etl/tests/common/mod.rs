//! Shared helpers for myfin-etl integration tests
//!
//! Database tests start a throwaway PostgreSQL container per test and need a
//! running Docker daemon. They are marked `#[ignore = "requires Docker"]`:
//!
//! ```bash
//! cargo test -p myfin-etl -- --ignored --nocapture
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use myfin_etl::config::{ApiConfig, DatabaseConfig, TableName};
use serde_json::{json, Value};
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

pub const TEST_TOKEN: &str = "test-token";
pub const TRANSACTIONS_PATH: &str = "/api/1.1/obj/transactions";

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,myfin_etl=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// PostgreSQL test container wrapper
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    host: String,
    port: u16,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?
            .to_string();
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .context("Failed to get container port")?;

        Ok(Self {
            _container: container,
            host,
            port,
        })
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            host: self.host.clone(),
            port: self.port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "postgres".to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            self.host, self.port
        )
    }

    /// A separate connection for assertions
    pub async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect(&self.connection_string())
            .await
            .context("Failed to connect to PostgreSQL")
    }

    pub async fn row_count(&self, table: &TableName) -> Result<i64> {
        let mut conn = self.connect().await?;
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut conn)
            .await?;
        Ok(count)
    }
}

pub fn transactions_table() -> TableName {
    TableName::new("transactions").unwrap()
}

/// API config pointing at a mock server, with no delay between pages
pub fn api_config(base_uri: &str) -> ApiConfig {
    ApiConfig::new(format!("{}{}", base_uri, TRANSACTIONS_PATH), TEST_TOKEN)
        .with_page_delay(Duration::ZERO)
        .with_timeout(Duration::from_secs(5))
}

/// A transaction as the API serves it
pub fn api_record(id: &str) -> Value {
    json!({
        "_id": id,
        "Created Date": "2024-02-28T12:30:00.000Z",
        "Modified Date": "2024-02-29T08:00:00.000Z",
        "Created By": "1700000000000x1",
        "estimated_date": "2024-03-01T10:00:00Z",
        "payment_date": null,
        "recipient_ref": "1700000000000x2",
        "status": "pending",
        "amount": 150.25,
        "year_ref": 2024,
        "month_ref": 3,
        "OS_type-transaction": "expense",
        "OS_frequency-type": "single",
        "user_ref": "1700000000000x3",
        "cod_ref": format!("COD-{}", id)
    })
}

/// One page envelope holding `ids`
pub fn api_page(ids: &[String], remaining: i64) -> Value {
    let results: Vec<Value> = ids.iter().map(|id| api_record(id)).collect();
    json!({
        "response": {
            "cursor": 0,
            "results": results,
            "count": ids.len(),
            "remaining": remaining
        }
    })
}

/// `count` sequential ids starting at `start`
pub fn ids(start: usize, count: usize) -> Vec<String> {
    (start..start + count).map(|i| format!("tx-{:04}", i)).collect()
}
