use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submitted card transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TransactionStatus {
    #[default]
    Requested,
    /// Breached the spend ceiling of the carried category.
    BreachLimit(String),
}

impl TransactionStatus {
    const BREACH_PREFIX: &'static str = "BREACH_LIMIT:";

    pub fn as_string(&self) -> String {
        match self {
            Self::Requested => "REQUESTED".to_string(),
            Self::BreachLimit(category) => format!("{}{category}", Self::BREACH_PREFIX),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(Self::BREACH_PREFIX) {
            Some(category) => Self::BreachLimit(category.to_string()),
            None => Self::Requested,
        }
    }

    pub fn is_breach(&self) -> bool {
        matches!(self, Self::BreachLimit(_))
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_string()
    }
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// One submitted card transaction, as persisted in `transaction_limit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub category: String,
    pub card_number: String,
    pub transaction_id: String,
    pub mcc: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_at: Option<DateTime<Utc>>,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "transaction_sum_amount", with = "rust_decimal::serde::float")]
    pub sum_amount: Decimal,
    #[serde(rename = "transaction_sum_count")]
    pub sum_count: i64,
    pub tenant_id: String,
}

/// `0001-01-01T00:00:00Z`, the zero time clients send for an empty timestamp.
const ZERO_TIME_SECS: i64 = -62_135_596_800;

impl TransactionRecord {
    /// Stamps `now` when the transaction carries no usable time.
    ///
    /// A missing timestamp and the zero time (or anything before it) are both
    /// unset, so the transaction always lands inside its own window.
    pub fn stamp_if_unset(&mut self, now: DateTime<Utc>) {
        match self.transaction_at {
            Some(at) if at.timestamp() > ZERO_TIME_SECS => {}
            _ => self.transaction_at = Some(now),
        }
    }

    #[cfg(test)]
    pub fn new(
        card_number: String,
        category: String,
        mcc: String,
        transaction_id: String,
        amount: Decimal,
    ) -> Self {
        Self {
            card_number,
            category,
            mcc,
            transaction_id,
            amount,
            currency: "USD".to_string(),
            ..Self::default()
        }
    }
}
