use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What an order limit line counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterKind {
    Value,
    Quantity,
    /// Reserved for time-bucketed limits; never evaluated.
    Minute,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "VALUE",
            Self::Quantity => "QUANTITY",
            Self::Minute => "MINUTE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "VALUE" => Some(Self::Value),
            "QUANTITY" => Some(Self::Quantity),
            "MINUTE" => Some(Self::Minute),
            _ => None,
        }
    }

    pub fn all() -> &'static [CounterKind] {
        &[Self::Value, Self::Quantity, Self::Minute]
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named family of quota rules, e.g. a product or channel code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeLimit {
    pub code: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl TypeLimit {
    pub fn new(code: String, category: String) -> Self {
        Self {
            code,
            category,
            created_at: Utc::now(),
        }
    }
}

/// One threshold line of a [`TypeLimit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub type_limit: String,
    pub counter_limit: CounterKind,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl OrderLimit {
    pub fn new(
        type_limit: String,
        order_type: String,
        counter_limit: CounterKind,
        amount: Decimal,
    ) -> Self {
        Self {
            id: None,
            type_limit,
            counter_limit,
            order_type,
            amount,
        }
    }
}

/// Inbound quota-check payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitCheckRequest {
    pub transaction_id: String,
    /// Subject identifier the usage is tracked under (account, document, device...).
    pub key: String,
    pub type_limit: String,
    pub order_limit: String,
    /// Carried for the caller's bookkeeping; every configured line is evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_limit: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub quantity: i64,
}

/// Verdict recorded for one evaluated order limit line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitStatus {
    /// Placeholder before a line is classified; never persisted.
    #[default]
    #[serde(rename = "LIMIT:APROVED")]
    Pending,
    #[serde(rename = "LIMIT:VALUE:APPROVED")]
    ValueApproved,
    #[serde(rename = "LIMIT:VALUE:BREACH")]
    ValueBreach,
    #[serde(rename = "LIMIT:QUANTITY:APPROVED")]
    QuantityApproved,
    #[serde(rename = "LIMIT:QUANTITY:BREACH")]
    QuantityBreach,
}

impl LimitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "LIMIT:APROVED",
            Self::ValueApproved => "LIMIT:VALUE:APPROVED",
            Self::ValueBreach => "LIMIT:VALUE:BREACH",
            Self::QuantityApproved => "LIMIT:QUANTITY:APPROVED",
            Self::QuantityBreach => "LIMIT:QUANTITY:BREACH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Pending,
            Self::ValueApproved,
            Self::ValueBreach,
            Self::QuantityApproved,
            Self::QuantityBreach,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
    }

    /// Classifies a line of the given counter kind.
    pub fn classify(counter: CounterKind, breached: bool) -> Self {
        match (counter, breached) {
            (CounterKind::Value, false) => Self::ValueApproved,
            (CounterKind::Value, true) => Self::ValueBreach,
            (CounterKind::Quantity, false) => Self::QuantityApproved,
            (CounterKind::Quantity, true) => Self::QuantityBreach,
            (CounterKind::Minute, _) => Self::Pending,
        }
    }

    pub fn is_breach(&self) -> bool {
        matches!(self, Self::ValueBreach | Self::QuantityBreach)
    }
}

impl std::fmt::Display for LimitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit row for one evaluated order limit line, stored in `limit_transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitTransactionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub transaction_id: String,
    pub key: String,
    pub type_limit: String,
    pub counter_limit: CounterKind,
    pub order_limit: String,
    pub status: LimitStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
