use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::db::{LimitStore, UsageKey};
use crate::error::LimitResult;
use crate::models::{CounterKind, LimitCheckRequest, LimitStatus, LimitTransactionRecord};

/// Trailing window, in minutes, quota usage is read over.
pub(crate) const QUOTA_WINDOW_MINUTES: i64 = 1;

/// Evaluates every order limit line of the request's type and order type.
///
/// Each non-`MINUTE` line gets one verdict row in `limit_transaction`. Usage for
/// a line is read before that line's row is written. Both `VALUE` and
/// `QUANTITY` lines compare the usage amount against the line threshold; a
/// `QUANTITY` line records the request quantity as its amount.
#[instrument(
    level = "info",
    skip_all,
    fields(transaction_id = %request.transaction_id, type_limit = %request.type_limit, order_limit = %request.order_limit)
)]
pub(crate) fn evaluate_quota(
    store: &LimitStore<'_>,
    request: &LimitCheckRequest,
    now: DateTime<Utc>,
) -> LimitResult<Vec<LimitTransactionRecord>> {
    let type_limit = store.get_type_limit(&request.type_limit)?;
    let lines = store.get_order_limits(&type_limit.code, &request.order_limit)?;
    let since = now - Duration::minutes(QUOTA_WINDOW_MINUTES);

    let mut verdicts = Vec::with_capacity(lines.len());
    for line in lines {
        let amount = match line.counter_limit {
            CounterKind::Minute => continue,
            CounterKind::Value => request.amount,
            CounterKind::Quantity => Decimal::from(request.quantity),
        };

        let usage_key = UsageKey {
            key: &request.key,
            type_limit: &line.type_limit,
            order_limit: &line.order_type,
            counter: line.counter_limit,
        };
        let usage = store.get_limit_usage(&usage_key, since, now)?;
        let breached = usage.amount > line.amount;

        let mut record = LimitTransactionRecord {
            id: None,
            transaction_id: request.transaction_id.clone(),
            key: request.key.clone(),
            type_limit: line.type_limit,
            counter_limit: line.counter_limit,
            order_limit: line.order_type,
            status: LimitStatus::classify(line.counter_limit, breached),
            amount,
            created_at: now,
        };
        record.id = Some(store.insert_limit_transaction(&record)?);
        debug!(
            counter = %record.counter_limit,
            usage = %usage.amount,
            threshold = %line.amount,
            status = %record.status,
            "order limit evaluated"
        );
        verdicts.push(record);
    }

    Ok(verdicts)
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod tests;
