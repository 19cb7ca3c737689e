//! MyFin ETL - sync MyFin transactions into PostgreSQL

use anyhow::{Context, Result};
use clap::Parser;
use myfin_common::logging::{init_logging, LogConfig};
use myfin_etl::{config::EtlConfig, sync};
use tracing::info;

/// Behavior is fixed; everything is configured through the environment.
#[derive(Parser, Debug)]
#[command(name = "myfin-etl")]
#[command(author, version, about = "Sync MyFin transactions into PostgreSQL")]
#[command(long_about = "Sync MyFin transactions into PostgreSQL.\n\n\
    Creates the target table and loads every transaction on the first run; \
    later runs fetch only records with a recent estimated_date. Existing rows \
    are never updated.\n\n\
    Required environment: API_TOKEN, DB_HOST, DB_USER, DB_PASSWORD, DB_NAME. \
    A .env file in the working directory is read if present.")]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _cli = Cli::parse();

    // Pick up LOG_* from .env before the subscriber is built
    dotenvy::dotenv().ok();

    let log_config = LogConfig::default()
        .with_log_file_prefix("myfin-etl")
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = EtlConfig::from_env().context("Failed to load configuration")?;
    info!(endpoint = %config.api.endpoint, table = %config.sync.table, "Configuration loaded");

    let report = sync::run(&config).await.context("Sync failed")?;

    println!("{}", report);
    Ok(())
}
