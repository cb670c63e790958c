//! One request, one database transaction.

use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;
use tracing::warn;

use crate::db::LimitStore;
use crate::error::{LimitError, LimitResult};

/// SQLite VM steps between deadline checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// Runs `work` inside a single transaction on `conn`.
///
/// Commits when `work` succeeds and rolls back when it fails. A panic inside
/// `work` unwinds through the transaction's drop, which rolls back as well.
/// With a `deadline`, statements still running past it are interrupted and
/// the request fails with [`LimitError::Timeout`] without committing.
pub(crate) fn within_transaction<T, F>(
    conn: &mut Connection,
    deadline: Option<Instant>,
    work: F,
) -> LimitResult<T>
where
    F: FnOnce(&LimitStore<'_>) -> LimitResult<T>,
{
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(LimitError::Timeout);
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| match LimitError::from(e) {
            _ if deadline.is_some_and(|deadline| Instant::now() >= deadline) => LimitError::Timeout,
            LimitError::Persistence(e) => LimitError::Connection(e.to_string()),
            other => other,
        })?;

    match deadline {
        Some(deadline) => {
            tx.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline))
        }
        None => tx.progress_handler(0, None::<fn() -> bool>),
    }

    let outcome = work(&LimitStore::new(&tx));

    // COMMIT and ROLLBACK must never be interrupted.
    tx.progress_handler(0, None::<fn() -> bool>);

    let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
    match outcome {
        Ok(_) if expired => {
            warn!("request deadline passed before commit; rolling back");
            rollback(tx);
            Err(LimitError::Timeout)
        }
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            rollback(tx);
            Err(err)
        }
    }
}

fn rollback(tx: rusqlite::Transaction<'_>) {
    if let Err(e) = tx.rollback() {
        warn!(error = %e, "rollback failed");
    }
}
