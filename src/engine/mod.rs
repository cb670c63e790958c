//! Limit evaluation: spend ceilings and order-line quotas.
//!
//! Each evaluation runs on one pooled connection inside one transaction, and
//! fails as a whole when any step fails or the request deadline passes.

pub(crate) mod boundary;
mod quota;
mod spend;

use chrono::Utc;
use std::time::Duration;

use crate::db::{DbPool, PoolStats};
use crate::error::LimitResult;
use crate::models::{LimitCheckRequest, LimitTransactionRecord, TransactionRecord};

pub(crate) use quota::evaluate_quota;
pub(crate) use spend::evaluate_transaction;

#[derive(Clone)]
pub(crate) struct LimitEngine {
    pool: DbPool,
    request_timeout: Duration,
}

impl LimitEngine {
    pub(crate) fn new(pool: DbPool, request_timeout: Duration) -> Self {
        Self {
            pool,
            request_timeout,
        }
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Records a card transaction and checks it against its spend ceiling.
    pub(crate) async fn evaluate_transaction(
        &self,
        txn: TransactionRecord,
    ) -> LimitResult<TransactionRecord> {
        let now = Utc::now();
        self.pool
            .interact(self.request_timeout, move |conn, deadline| {
                boundary::within_transaction(conn, Some(deadline), |store| {
                    spend::evaluate_transaction(store, txn, now)
                })
            })
            .await
    }

    /// Evaluates a quota request line by line, all or nothing.
    pub(crate) async fn check_limit(
        &self,
        request: LimitCheckRequest,
    ) -> LimitResult<Vec<LimitTransactionRecord>> {
        let now = Utc::now();
        self.pool
            .interact(self.request_timeout, move |conn, deadline| {
                boundary::within_transaction(conn, Some(deadline), |store| {
                    quota::evaluate_quota(store, &request, now)
                })
            })
            .await
    }

    pub(crate) fn stat(&self) -> PoolStats {
        self.pool.stat()
    }

    pub(crate) fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests;
