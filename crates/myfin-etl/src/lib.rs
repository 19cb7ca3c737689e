//! MyFin ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pulls transaction records from the MyFin API page by page and stores them
//! in PostgreSQL, skipping rows that already exist.
//!
//! - [`fetcher`]: cursor pagination over the Bubble Data API
//! - [`loader`]: schema creation and per-row idempotent inserts
//! - [`sync`]: initial vs incremental branch selection and the run report
//! - [`config`]: environment-driven settings
//!
//! # Example
//!
//! ```no_run
//! use myfin_etl::{config::EtlConfig, sync};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EtlConfig::from_env()?;
//!     let report = sync::run(&config).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod sync;

pub use error::{EtlError, Result};
