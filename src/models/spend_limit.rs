use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spend ceiling configured for a (category, mcc) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendLimit {
    pub category: String,
    pub mcc: String,
    #[serde(rename = "limit_amount", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "limit_day")]
    pub day_count: i64,
    #[serde(rename = "limit_hour")]
    pub hour_count: i64,
    #[serde(rename = "limit_minute")]
    pub minute_count: i64,
}

impl SpendLimit {
    pub fn new(category: String, mcc: String, amount: Decimal) -> Self {
        Self {
            category,
            mcc,
            amount,
            day_count: 0,
            hour_count: 0,
            minute_count: 0,
        }
    }

    /// A window breaches when either its amount or its row count exceeds the ceiling.
    pub fn is_breached_by(&self, usage: &WindowUsage) -> bool {
        usage.amount > self.amount || usage.count > self.hour_count
    }
}

/// Sum of amounts and count of rows over a trailing time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowUsage {
    pub amount: Decimal,
    pub count: i64,
}

/// Audit row written when a transaction breaches its spend ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "fk_id_transaction_limit")]
    pub transaction_limit_id: i64,
    pub transaction_id: String,
    pub mcc: String,
    pub status: String,
    /// Ceiling minus window sum; negative once breached.
    #[serde(rename = "breach_amount", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "breach_count")]
    pub count: i64,
    pub created_at: DateTime<Utc>,
    pub tenant_id: String,
}
