mod pool;
mod schema;
mod store;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::models::*;

pub(crate) use pool::{DbPool, PoolStats};
pub(crate) use store::{LimitStore, UsageKey};

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set journal mode")?;
        configure_connection(&conn, busy_timeout).context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn, Duration::from_secs(1))?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn migrate(&mut self) -> Result<()> {
        // Check if schema_version table exists
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        let tx = self.conn.transaction()?;
        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                tx.execute_batch(sql)?;
            }
        }
        if current < schema::CURRENT_VERSION {
            tx.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }
        tx.commit()?;

        Ok(())
    }

    pub(crate) fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })?)
    }

    // ── Limit configuration ───────────────────────────────────

    pub(crate) fn upsert_spend_limit(&self, limit: &SpendLimit) -> Result<()> {
        self.conn.execute(
            "INSERT INTO spend_limit (category, mcc, amount, day, hour, minute)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, mcc) DO UPDATE
             SET amount = ?3, day = ?4, hour = ?5, minute = ?6",
            params![
                limit.category,
                limit.mcc,
                limit.amount.to_string(),
                limit.day_count,
                limit.hour_count,
                limit.minute_count,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn get_spend_limits(&self) -> Result<Vec<SpendLimit>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, mcc, amount, day, hour, minute FROM spend_limit ORDER BY category, mcc",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SpendLimit {
                category: row.get(0)?,
                mcc: row.get(1)?,
                amount: decimal_column(row, 2)?,
                day_count: row.get(3)?,
                hour_count: row.get(4)?,
                minute_count: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn insert_type_limit(&self, type_limit: &TypeLimit) -> Result<()> {
        self.conn.execute(
            "INSERT INTO type_limit (code, category, created_at) VALUES (?1, ?2, ?3)",
            params![
                type_limit.code,
                type_limit.category,
                to_sql_timestamp(&type_limit.created_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn insert_order_limit(&self, order_limit: &OrderLimit) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO order_limit (fk_type_limit_code, fk_counter_limit_code, type, amount)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                order_limit.type_limit,
                order_limit.counter_limit.as_str(),
                order_limit.order_type,
                order_limit.amount.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ── Audit history ─────────────────────────────────────────

    pub(crate) fn get_breach_limits(&self, limit: u32) -> Result<Vec<BreachLimit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fk_id_trans_limit, transaction_id, mcc, status, amount, count, created_at, tenant_id
             FROM breach_limit ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(BreachLimit {
                id: Some(row.get(0)?),
                transaction_limit_id: row.get(1)?,
                transaction_id: row.get(2)?,
                mcc: row.get(3)?,
                status: row.get(4)?,
                amount: decimal_column(row, 5)?,
                count: row.get(6)?,
                created_at: timestamp_column(row, 7)?,
                tenant_id: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_limit_transactions(
        &self,
        key: &str,
        limit: u32,
    ) -> Result<Vec<LimitTransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, transaction_id, key, fk_type_limit_code, fk_counter_limit_code,
                    fk_order_limit_type, status, amount, created_at
             FROM limit_transaction WHERE key = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![key, limit], |row| {
            Ok(LimitTransactionRecord {
                id: Some(row.get(0)?),
                transaction_id: row.get(1)?,
                key: row.get(2)?,
                type_limit: row.get(3)?,
                counter_limit: counter_column(row, 4)?,
                order_limit: row.get(5)?,
                status: status_column(row, 6)?,
                amount: decimal_column(row, 7)?,
                created_at: timestamp_column(row, 8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_transaction_limits(&self, card_number: &str) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, transaction_id, category, card_number, mcc, status, transaction_at,
                    currency, amount, tenant_id
             FROM transaction_limit WHERE card_number = ?1
             ORDER BY transaction_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![card_number], |row| {
            Ok(TransactionRecord {
                id: Some(row.get(0)?),
                transaction_id: row.get(1)?,
                category: row.get(2)?,
                card_number: row.get(3)?,
                mcc: row.get(4)?,
                status: TransactionStatus::parse(&row.get::<_, String>(5)?),
                transaction_at: Some(timestamp_column(row, 6)?),
                currency: row.get(7)?,
                amount: decimal_column(row, 8)?,
                tenant_id: row.get(9)?,
                ..TransactionRecord::default()
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// Per-connection settings; `foreign_keys` is not persisted in the database file.
pub(crate) fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(busy_timeout)
}

/// Fixed-width UTC timestamps so that text comparison is chronological.
pub(crate) fn to_sql_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_decimal(s: &str) -> std::result::Result<Decimal, rust_decimal::Error> {
    Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    parse_decimal(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn counter_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<CounterKind> {
    let raw: String = row.get(idx)?;
    CounterKind::parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown counter kind '{raw}'")))
}

fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<LimitStatus> {
    let raw: String = row.get(idx)?;
    LimitStatus::parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown limit status '{raw}'")))
}
