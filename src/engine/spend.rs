use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use crate::db::LimitStore;
use crate::error::LimitResult;
use crate::models::{BreachLimit, TransactionRecord, TransactionStatus};

/// Trailing window, in minutes, the spend ceiling is checked against.
pub(crate) const SPEND_WINDOW_MINUTES: i64 = 30;

/// Records `txn` and checks the card's trailing spend against its ceiling.
///
/// The window is read after the insert, so the transaction's own amount counts
/// toward the ceiling. A breach flips the status to `BREACH_LIMIT:<category>`
/// and writes a [`BreachLimit`] row; both happen in the caller's transaction.
#[instrument(
    level = "info",
    skip_all,
    fields(transaction_id = %txn.transaction_id, category = %txn.category, mcc = %txn.mcc)
)]
pub(crate) fn evaluate_transaction(
    store: &LimitStore<'_>,
    mut txn: TransactionRecord,
    now: DateTime<Utc>,
) -> LimitResult<TransactionRecord> {
    txn.status = TransactionStatus::Requested;
    txn.stamp_if_unset(now);
    let id = store.insert_transaction(&txn)?;
    txn.id = Some(id);

    let limit = store.get_spend_limit(&txn.category, &txn.mcc)?;
    let window = store.get_spend_window(
        &txn.card_number,
        &txn.category,
        &txn.mcc,
        now - Duration::minutes(SPEND_WINDOW_MINUTES),
        now,
    )?;
    txn.sum_amount = window.amount;
    txn.sum_count = window.count;

    if limit.is_breached_by(&window) {
        txn.status = TransactionStatus::BreachLimit(txn.category.clone());
        store.update_transaction_status(id, &txn.status)?;
        let breach = BreachLimit {
            id: None,
            transaction_limit_id: id,
            transaction_id: txn.transaction_id.clone(),
            mcc: txn.mcc.clone(),
            status: txn.status.as_string(),
            amount: limit.amount - window.amount,
            count: window.count,
            created_at: now,
            tenant_id: txn.tenant_id.clone(),
        };
        store.insert_breach_limit(&breach)?;
        info!(
            sum_amount = %window.amount,
            sum_count = window.count,
            limit_amount = %limit.amount,
            "spend limit breached"
        );
    }

    Ok(txn)
}

#[cfg(test)]
#[path = "spend_tests.rs"]
mod tests;
