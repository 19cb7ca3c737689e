//! Sync orchestration
//!
//! One run takes one of two branches, decided by whether the target table
//! already exists:
//!
//! ```text
//! table absent  -> fetch everything         -> create table -> transform -> insert -> report
//! table present -> fetch estimated_date > D -> (empty? report 0)
//!                                           -> transform -> insert -> report
//! ```
//!
//! where `D` is the calendar date `now - incremental_window_days`. The table
//! is only created after a fetch succeeds, so a run that fails before that
//! leaves a fresh database fresh and the next run still does the full load.

use chrono::{DateTime, Duration, Utc};
use myfin_common::dates::DATE_FORMAT;
use myfin_common::types::{RawTransaction, Transaction};
use std::fmt;
use tracing::{info, instrument, warn};

use crate::config::{EtlConfig, SyncConfig};
use crate::error::{EtlError, Result};
use crate::fetcher::{Constraint, TransactionFetcher, TransactionSource};
use crate::loader::{LoadReport, PgLoader, TransactionSink};

/// Which branch a run took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Table did not exist; full unfiltered load
    Initial,
    /// Table existed; only recent records were fetched
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Initial => write!(f, "initial"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Records returned by the API
    pub fetched: usize,
    /// Records dropped in transform because they had no identifier
    pub dropped: usize,
    pub load: LoadReport,
}

impl SyncReport {
    /// Number of newly stored rows
    pub fn inserted(&self) -> usize {
        self.load.inserted
    }
}

/// The single line printed at the end of a run
impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SyncMode::Initial => write!(
                f,
                "Total records inserted in initial load: {}",
                self.load.inserted
            ),
            SyncMode::Incremental if self.fetched == 0 => {
                write!(f, "No new data to update. Total records inserted: 0")
            },
            SyncMode::Incremental => write!(f, "Total records inserted: {}", self.load.inserted),
        }
    }
}

/// Filter for incremental runs: `<filter_key> > (now - window)` as a date
pub fn incremental_constraint(config: &SyncConfig, now: DateTime<Utc>) -> Result<Constraint> {
    let since = Duration::try_days(config.incremental_window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            EtlError::config(format!(
                "incremental window of {} days is out of range",
                config.incremental_window_days
            ))
        })?;

    Ok(Constraint::greater_than(
        config.filter_key.clone(),
        since.format(DATE_FORMAT).to_string(),
    ))
}

/// Normalize raw records; returns the stored-shape records and how many were dropped
pub fn transform(raw: Vec<RawTransaction>) -> (Vec<Transaction>, usize) {
    let total = raw.len();
    let records: Vec<Transaction> = raw
        .into_iter()
        .filter_map(|raw| match Transaction::try_from(raw) {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!(error = %e, "Dropping record");
                None
            },
        })
        .collect();

    let dropped = total - records.len();
    (records, dropped)
}

/// Run one sync against the given source and sink
#[instrument(skip_all, fields(table = %config.table))]
pub async fn run_sync<S, K>(
    source: &S,
    sink: &mut K,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<SyncReport>
where
    S: TransactionSource + ?Sized,
    K: TransactionSink + ?Sized,
{
    let table = &config.table;

    let exists = sink.table_exists(table).await?;

    let (mode, constraint) = if exists {
        (SyncMode::Incremental, Some(incremental_constraint(config, now)?))
    } else {
        (SyncMode::Initial, None)
    };

    info!(%mode, filter = ?constraint, "Starting sync");

    let raw = source.fetch(constraint.as_ref()).await?;
    let fetched = raw.len();

    if mode == SyncMode::Incremental && raw.is_empty() {
        info!("No new data to update");
        return Ok(SyncReport {
            mode,
            fetched,
            dropped: 0,
            load: LoadReport::default(),
        });
    }

    sink.ensure_schema(table).await?;

    let (records, dropped) = transform(raw);
    let load = sink.insert_all(&records, table).await?;

    info!(
        %mode,
        fetched,
        dropped,
        inserted = load.inserted,
        skipped = load.skipped,
        "Sync complete"
    );

    Ok(SyncReport {
        mode,
        fetched,
        dropped,
        load,
    })
}

/// Full production run: HTTP fetcher, PostgreSQL loader, wall-clock time
///
/// The database connection is closed on every path. If the run itself
/// failed, that error wins over any error from closing.
pub async fn run(config: &EtlConfig) -> Result<SyncReport> {
    let fetcher = TransactionFetcher::new(&config.api)?;
    let mut loader = PgLoader::connect(&config.database).await?;

    let result = run_sync(&fetcher, &mut loader, &config.sync, Utc::now()).await;

    match (loader.close().await, &result) {
        (Err(close_err), Ok(_)) => return Err(close_err),
        (Err(close_err), Err(_)) => {
            warn!(error = %close_err, "Failed to close database connection after failed run");
        },
        (Ok(()), _) => {},
    }

    result
}
