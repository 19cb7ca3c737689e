//! Configuration management
//!
//! Everything the run needs is read once at startup into [`EtlConfig`] and
//! handed to the fetcher and loader by reference. Nothing mutates it
//! afterwards.

use std::fmt;
use std::time::Duration;

use crate::error::{EtlError, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default transactions endpoint of the MyFin Bubble app.
pub const DEFAULT_API_URL: &str =
    "https://myfin-financial-management.bubbleapps.io/api/1.1/obj/transactions";

/// Records per page served by the API; the cursor advances by this much.
pub const PAGE_SIZE: u32 = 100;

/// Default pause between page requests, in milliseconds.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 1000;

/// Default timeout for a single API request, in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Default PostgreSQL port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default target table.
pub const DEFAULT_TABLE: &str = "transactions";

/// Default look-back window for incremental runs, in days.
pub const DEFAULT_INCREMENTAL_DAYS: i64 = 2;

/// Upper bound for the incremental look-back window, in days.
pub const MAX_INCREMENTAL_DAYS: i64 = 36_500;

/// Longest accepted table name. PostgreSQL truncates identifiers past 63
/// bytes, and the derived `<table>_pkey` constraint name must fit.
pub const MAX_TABLE_NAME_LEN: usize = 63 - "_pkey".len();

/// Field the incremental filter is applied to.
pub const INCREMENTAL_FILTER_KEY: &str = "estimated_date";

/// Full sync job configuration
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

/// Remote transactions API settings
#[derive(Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub token: String,
    pub page_size: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

/// Database connection settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub connect_timeout: Duration,
}

/// What to sync and how far back incremental runs look
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub table: TableName,
    pub incremental_window_days: i64,
    pub filter_key: String,
}

impl EtlConfig {
    /// Load configuration from a `.env` file (if present) and the environment
    ///
    /// Required variables: `API_TOKEN`, `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`.
    ///
    /// Optional variables:
    /// - `MYFIN_API_URL`: transactions endpoint
    /// - `MYFIN_PAGE_DELAY_MS`: pause between pages
    /// - `MYFIN_API_TIMEOUT_SECS`: per-request timeout
    /// - `DB_PORT`, `DB_CONNECT_TIMEOUT`
    /// - `MYFIN_TABLE`: target table
    /// - `MYFIN_INCREMENTAL_DAYS`: look-back window for incremental runs
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let config = EtlConfig {
            api: ApiConfig {
                endpoint: vars.or("MYFIN_API_URL", DEFAULT_API_URL),
                token: vars.required("API_TOKEN")?,
                page_size: PAGE_SIZE,
                page_delay: Duration::from_millis(
                    vars.parsed("MYFIN_PAGE_DELAY_MS", DEFAULT_PAGE_DELAY_MS)?,
                ),
                timeout: Duration::from_secs(
                    vars.parsed("MYFIN_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?,
                ),
            },
            database: DatabaseConfig {
                host: vars.required("DB_HOST")?,
                port: vars.parsed("DB_PORT", DEFAULT_DB_PORT)?,
                user: vars.required("DB_USER")?,
                password: vars.required("DB_PASSWORD")?,
                name: vars.required("DB_NAME")?,
                connect_timeout: Duration::from_secs(
                    vars.parsed("DB_CONNECT_TIMEOUT", DEFAULT_DB_CONNECT_TIMEOUT_SECS)?,
                ),
            },
            sync: SyncConfig {
                table: TableName::new(vars.or("MYFIN_TABLE", DEFAULT_TABLE))?,
                incremental_window_days: vars
                    .parsed("MYFIN_INCREMENTAL_DAYS", DEFAULT_INCREMENTAL_DAYS)?,
                filter_key: INCREMENTAL_FILTER_KEY.to_string(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if reqwest::Url::parse(&self.api.endpoint).is_err() {
            return Err(EtlError::config(format!(
                "MYFIN_API_URL '{}' is not a valid URL",
                self.api.endpoint
            )));
        }

        if self.api.timeout.is_zero() {
            return Err(EtlError::config("MYFIN_API_TIMEOUT_SECS must be greater than 0"));
        }

        if self.database.port == 0 {
            return Err(EtlError::config("DB_PORT must be greater than 0"));
        }

        if self.sync.incremental_window_days < 0 {
            return Err(EtlError::config("MYFIN_INCREMENTAL_DAYS cannot be negative"));
        }

        if self.sync.incremental_window_days > MAX_INCREMENTAL_DAYS {
            return Err(EtlError::config(format!(
                "MYFIN_INCREMENTAL_DAYS cannot exceed {}",
                MAX_INCREMENTAL_DAYS
            )));
        }

        Ok(())
    }
}

impl ApiConfig {
    /// Configuration for the given endpoint with default paging behavior
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            page_size: PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }

    /// Set the pause between page requests
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SyncConfig {
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            incremental_window_days: DEFAULT_INCREMENTAL_DAYS,
            filter_key: INCREMENTAL_FILTER_KEY.to_string(),
        }
    }

    pub fn with_incremental_window_days(mut self, days: i64) -> Self {
        self.incremental_window_days = days;
        self
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("page_delay", &self.page_delay)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A table name that is safe to splice into SQL text.
///
/// Only lowercase identifiers are accepted: PostgreSQL folds unquoted names,
/// and the catalog lookup and constraint name must match what it stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_lowercase() || first == '_')
                    && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                    && name.len() <= MAX_TABLE_NAME_LEN
            },
            None => false,
        };

        if valid {
            Ok(Self(name))
        } else {
            Err(EtlError::InvalidTableName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the primary key constraint created by `ensure_schema`
    pub fn primary_key_constraint(&self) -> String {
        format!("{}_pkey", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| EtlError::config(format!("{} is not set", key)))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| EtlError::config(format!("{} has invalid value '{}'", key, raw))),
            None => Ok(default),
        }
    }
}
