//! Reads and writes issued by the limit engine inside a request transaction.
//!
//! Every method runs against the connection the request's transaction was
//! opened on, so windowed reads observe rows inserted earlier in the same
//! request.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};

use super::{counter_column, decimal_column, timestamp_column, to_sql_timestamp};
use crate::error::{LimitError, LimitResult};
use crate::models::*;

/// Identifies the usage counter a quota line reads from `limit_transaction`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UsageKey<'k> {
    pub key: &'k str,
    pub type_limit: &'k str,
    pub order_limit: &'k str,
    pub counter: CounterKind,
}

pub(crate) struct LimitStore<'c> {
    conn: &'c Connection,
}

impl<'c> LimitStore<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        self.conn
    }

    // ── Spend ceilings ────────────────────────────────────────

    #[instrument(level = "debug", skip_all, fields(transaction_id = %txn.transaction_id))]
    pub(crate) fn insert_transaction(&self, txn: &TransactionRecord) -> LimitResult<i64> {
        let transaction_at = txn.transaction_at.unwrap_or_else(Utc::now);
        self.conn.execute(
            "INSERT INTO transaction_limit (transaction_id, category, card_number, mcc, status,
                                            transaction_at, currency, amount, tenant_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.transaction_id,
                txn.category,
                txn.card_number,
                txn.mcc,
                txn.status.as_string(),
                to_sql_timestamp(&transaction_at),
                txn.currency,
                txn.amount.to_string(),
                txn.tenant_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, "transaction recorded");
        Ok(id)
    }

    pub(crate) fn update_transaction_status(
        &self,
        id: i64,
        status: &TransactionStatus,
    ) -> LimitResult<()> {
        let updated = self.conn.execute(
            "UPDATE transaction_limit SET status = ?1 WHERE id = ?2",
            params![status.as_string(), id],
        )?;
        if updated == 0 {
            return Err(LimitError::not_found("transaction_limit", id.to_string()));
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub(crate) fn get_spend_limit(&self, category: &str, mcc: &str) -> LimitResult<SpendLimit> {
        self.conn
            .query_row(
                "SELECT category, mcc, amount, day, hour, minute
                 FROM spend_limit WHERE category = ?1 AND mcc = ?2",
                params![category, mcc],
                |row| {
                    Ok(SpendLimit {
                        category: row.get(0)?,
                        mcc: row.get(1)?,
                        amount: decimal_column(row, 2)?,
                        day_count: row.get(3)?,
                        hour_count: row.get(4)?,
                        minute_count: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| LimitError::not_found("spend_limit", format!("{category}/{mcc}")))
    }

    /// Sum and count of a card's transactions for (category, mcc) within `[since, until]`.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn get_spend_window(
        &self,
        card_number: &str,
        category: &str,
        mcc: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LimitResult<WindowUsage> {
        let usage = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS TEXT), COUNT(1)
             FROM transaction_limit
             WHERE card_number = ?1 AND category = ?2 AND mcc = ?3
               AND transaction_at BETWEEN ?4 AND ?5",
            params![
                card_number,
                category,
                mcc,
                to_sql_timestamp(&since),
                to_sql_timestamp(&until),
            ],
            |row| {
                Ok(WindowUsage {
                    amount: decimal_column(row, 0)?,
                    count: row.get(1)?,
                })
            },
        )?;
        Ok(usage)
    }

    pub(crate) fn insert_breach_limit(&self, breach: &BreachLimit) -> LimitResult<i64> {
        self.conn.execute(
            "INSERT INTO breach_limit (fk_id_trans_limit, transaction_id, mcc, status,
                                       amount, count, created_at, tenant_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                breach.transaction_limit_id,
                breach.transaction_id,
                breach.mcc,
                breach.status,
                breach.amount.to_string(),
                breach.count,
                to_sql_timestamp(&breach.created_at),
                breach.tenant_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ── Quotas ────────────────────────────────────────────────

    #[instrument(level = "debug", skip(self))]
    pub(crate) fn get_type_limit(&self, code: &str) -> LimitResult<TypeLimit> {
        self.conn
            .query_row(
                "SELECT code, category, created_at FROM type_limit WHERE code = ?1",
                params![code],
                |row| {
                    Ok(TypeLimit {
                        code: row.get(0)?,
                        category: row.get(1)?,
                        created_at: timestamp_column(row, 2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| LimitError::not_found("type_limit", code))
    }

    /// Limit lines of a type limit for one order type; empty when none are configured.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn get_order_limits(
        &self,
        type_limit: &str,
        order_type: &str,
    ) -> LimitResult<Vec<OrderLimit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fk_type_limit_code, fk_counter_limit_code, type, amount
             FROM order_limit
             WHERE fk_type_limit_code = ?1 AND type = ?2
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![type_limit, order_type], |row| {
            Ok(OrderLimit {
                id: Some(row.get(0)?),
                type_limit: row.get(1)?,
                counter_limit: counter_column(row, 2)?,
                order_type: row.get(3)?,
                amount: decimal_column(row, 4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Recorded usage for one counter within `[since, until]`.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn get_limit_usage(
        &self,
        usage_key: &UsageKey<'_>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LimitResult<WindowUsage> {
        let usage = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS TEXT), COUNT(1)
             FROM limit_transaction
             WHERE key = ?1
               AND fk_type_limit_code = ?2
               AND fk_order_limit_type = ?3
               AND fk_counter_limit_code = ?4
               AND created_at BETWEEN ?5 AND ?6",
            params![
                usage_key.key,
                usage_key.type_limit,
                usage_key.order_limit,
                usage_key.counter.as_str(),
                to_sql_timestamp(&since),
                to_sql_timestamp(&until),
            ],
            |row| {
                Ok(WindowUsage {
                    amount: decimal_column(row, 0)?,
                    count: row.get(1)?,
                })
            },
        )?;
        Ok(usage)
    }

    pub(crate) fn insert_limit_transaction(
        &self,
        record: &LimitTransactionRecord,
    ) -> LimitResult<i64> {
        self.conn.execute(
            "INSERT INTO limit_transaction (transaction_id, key, fk_type_limit_code,
                                            fk_counter_limit_code, fk_order_limit_type,
                                            status, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.transaction_id,
                record.key,
                record.type_limit,
                record.counter_limit.as_str(),
                record.order_limit,
                record.status.as_str(),
                record.amount.to_string(),
                to_sql_timestamp(&record.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
