//! Transaction record types
//!
//! [`RawTransaction`] mirrors one element of the API's `results` array,
//! keeping the API's own field names. [`Transaction`] is the flat, typed row
//! that gets stored. Conversion between the two is where date coercion
//! happens.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::dates::coerce_timestamp;
use crate::error::{MyfinError, Result};

/// A transaction exactly as the remote API returns it.
///
/// Date and numeric fields are kept as raw JSON so that a badly typed value
/// never rejects the whole record. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "_id", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(rename = "Created Date", default)]
    pub created_at: Option<Value>,

    #[serde(rename = "Modified Date", default)]
    pub modified_at: Option<Value>,

    #[serde(default)]
    pub estimated_date: Option<Value>,

    #[serde(default)]
    pub payment_date: Option<Value>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub recipient_ref: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub user_ref: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub cod_ref: Option<String>,

    #[serde(rename = "Created By", default, deserialize_with = "lenient_string")]
    pub created_by: Option<String>,

    #[serde(rename = "OS_type-transaction", default, deserialize_with = "lenient_string")]
    pub transaction_type: Option<String>,

    #[serde(rename = "OS_frequency-type", default, deserialize_with = "lenient_string")]
    pub frequency_type: Option<String>,

    #[serde(default)]
    pub amount: Option<Value>,

    #[serde(default)]
    pub year_ref: Option<Value>,

    #[serde(default)]
    pub month_ref: Option<Value>,
}

impl RawTransaction {
    /// Decode a single element of a page's `results` array
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A normalized transaction, ready to be stored.
///
/// Every field except `id` is nullable. Date fields hold either a valid UTC
/// instant or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// External identifier, primary key in storage
    pub id: String,

    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub estimated_date: Option<DateTime<Utc>>,
    pub payment_date: Option<DateTime<Utc>>,

    pub recipient_ref: Option<String>,
    pub status: Option<String>,
    pub user_ref: Option<String>,
    pub cod_ref: Option<String>,
    pub created_by: Option<String>,
    pub transaction_type: Option<String>,
    pub frequency_type: Option<String>,

    /// Monetary amount, stored with two fractional digits
    pub amount: Option<BigDecimal>,

    pub year_ref: Option<i32>,
    pub month_ref: Option<i32>,
}

impl Transaction {
    /// Create a transaction with only its identifier set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            modified_at: None,
            estimated_date: None,
            payment_date: None,
            recipient_ref: None,
            status: None,
            user_ref: None,
            cod_ref: None,
            created_by: None,
            transaction_type: None,
            frequency_type: None,
            amount: None,
            year_ref: None,
            month_ref: None,
        }
    }
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = MyfinError;

    fn try_from(raw: RawTransaction) -> Result<Self> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(MyfinError::MissingId)?;

        Ok(Self {
            id,
            created_at: raw.created_at.as_ref().and_then(coerce_timestamp),
            modified_at: raw.modified_at.as_ref().and_then(coerce_timestamp),
            estimated_date: raw.estimated_date.as_ref().and_then(coerce_timestamp),
            payment_date: raw.payment_date.as_ref().and_then(coerce_timestamp),
            recipient_ref: raw.recipient_ref,
            status: raw.status,
            user_ref: raw.user_ref,
            cod_ref: raw.cod_ref,
            created_by: raw.created_by,
            transaction_type: raw.transaction_type,
            frequency_type: raw.frequency_type,
            amount: raw.amount.as_ref().and_then(to_decimal),
            year_ref: raw.year_ref.as_ref().and_then(to_i32),
            month_ref: raw.month_ref.as_ref().and_then(to_i32),
        })
    }
}

/// Accept strings, numbers and booleans for text columns; everything else is absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn to_decimal(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn to_i32(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|i| i32::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
