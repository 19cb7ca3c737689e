//! Paginated fetch from the MyFin transactions API
//!
//! The API speaks Bubble's Data API protocol:
//!
//! ```text
//! GET <endpoint>?cursor=<offset>&constraints=<json>
//! Authorization: Bearer <token>
//!
//! {"response": {"results": [...], "remaining": <int>, ...}}
//! ```
//!
//! The fetcher walks the cursor in steps of the page size until the server
//! reports nothing remaining, sleeping between pages to stay under the
//! API's rate limit.
//!
//! Failure handling is deliberately asymmetric. Transport errors and non-2xx
//! statuses abort the fetch on any page. A body that is not the expected
//! envelope aborts on the first page, but on later pages the API uses empty
//! or shapeless bodies to mean "no more data", so there it ends pagination.

use async_trait::async_trait;
use myfin_common::types::RawTransaction;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{EtlError, Result};

/// Bubble constraint type for strict "after" comparisons
pub const GREATER_THAN: &str = "greater than";

/// A single Bubble Data API search constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub key: String,
    pub constraint_type: String,
    pub value: String,
}

impl Constraint {
    /// `key > value`
    pub fn greater_than(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            constraint_type: GREATER_THAN.to_string(),
            value: value.into(),
        }
    }

    /// Encode as the `constraints` query parameter (a JSON array)
    pub fn to_query_value(&self) -> String {
        serde_json::json!([self]).to_string()
    }
}

/// Anything that can produce the raw transaction set for a run
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch every matching record, optionally filtered by `constraint`
    async fn fetch(&self, constraint: Option<&Constraint>) -> Result<Vec<RawTransaction>>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    remaining: i64,
}

enum PageOutcome {
    Page(Page),
    /// Body arrived but was not a usable envelope
    Unreadable(String),
}

/// HTTP fetcher for the transactions endpoint
pub struct TransactionFetcher {
    client: Client,
    config: ApiConfig,
}

impl TransactionFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn request_page(&self, cursor: u32, constraints: Option<&str>) -> Result<PageOutcome> {
        let mut params = vec![("cursor", cursor.to_string())];
        if let Some(constraints) = constraints {
            params.push(("constraints", constraints.to_string()));
        }

        let response = self
            .client
            .get(&self.config.endpoint)
            .bearer_auth(&self.config.token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::Api { status, body });
        }

        let body = response.text().await?;
        Ok(match serde_json::from_str::<Envelope>(&body) {
            Ok(Envelope {
                response: Some(page),
            }) => PageOutcome::Page(page),
            Ok(Envelope { response: None }) => {
                PageOutcome::Unreadable("body has no 'response' object".to_string())
            },
            Err(e) => PageOutcome::Unreadable(format!("invalid JSON body: {}", e)),
        })
    }
}

#[async_trait]
impl TransactionSource for TransactionFetcher {
    async fn fetch(&self, constraint: Option<&Constraint>) -> Result<Vec<RawTransaction>> {
        let constraints = constraint.map(Constraint::to_query_value);
        let mut records = Vec::new();
        let mut cursor: u32 = 0;
        let mut pages: u32 = 0;

        info!(
            endpoint = %self.config.endpoint,
            filtered = constraints.is_some(),
            "Fetching transactions"
        );

        loop {
            pages += 1;

            let page = match self.request_page(cursor, constraints.as_deref()).await? {
                PageOutcome::Page(page) => page,
                PageOutcome::Unreadable(reason) if pages == 1 => {
                    return Err(EtlError::malformed(reason));
                },
                PageOutcome::Unreadable(reason) => {
                    warn!(cursor, page = pages, %reason, "Treating unreadable page as end of data");
                    break;
                },
            };

            let received = page.results.len();
            records.extend(decode_results(page.results));

            debug!(
                cursor,
                page = pages,
                received,
                remaining = page.remaining,
                "Fetched page"
            );

            if page.remaining <= 0 {
                break;
            }

            cursor += self.config.page_size;
            tokio::time::sleep(self.config.page_delay).await;
        }

        info!(pages, fetched = records.len(), "Fetch complete");

        Ok(records)
    }
}

fn decode_results(results: Vec<Value>) -> Vec<RawTransaction> {
    results
        .into_iter()
        .filter_map(|value| match RawTransaction::from_value(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(error = %e, "Skipping result that is not a transaction object");
                None
            },
        })
        .collect()
}
