//! MyFin Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, date handling, logging, and error handling for the MyFin
//! transaction sync.
//!
//! # Overview
//!
//! - **Types**: the transaction record as the remote API returns it and in
//!   its normalized, storable form
//! - **Dates**: lenient timestamp coercion (unparsable values become absent)
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Error Handling**: the shared error and result types
//!
//! # Example
//!
//! ```no_run
//! use myfin_common::types::{RawTransaction, Transaction};
//!
//! fn normalize(raw: RawTransaction) -> myfin_common::Result<Transaction> {
//!     Transaction::try_from(raw)
//! }
//! ```

pub mod dates;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{MyfinError, Result};
