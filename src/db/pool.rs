//! Pooled access to the database for the HTTP server.
//!
//! Connections are handed out by `deadpool-sqlite` and all rusqlite work runs
//! on its blocking executor. Dropping the pooled object is the only place a
//! connection goes back to the pool.

use anyhow::Context;
use deadpool_sqlite::{Config, InteractError, Pool, PoolConfig, Runtime};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

use super::configure_connection;
use crate::error::{LimitError, LimitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct PoolStats {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}

#[derive(Clone)]
pub(crate) struct DbPool {
    pool: Pool,
    busy_timeout: Duration,
}

impl DbPool {
    pub(crate) fn open(path: &Path, max_size: usize, busy_timeout: Duration) -> anyhow::Result<Self> {
        let mut config = Config::new(path);
        config.pool = Some(PoolConfig::new(max_size));
        let pool = config
            .create_pool(Runtime::Tokio1)
            .with_context(|| format!("Failed to create connection pool for {}", path.display()))?;
        Ok(Self { pool, busy_timeout })
    }

    pub(crate) fn stat(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Runs `work` on a pooled connection within `timeout`.
    ///
    /// Only the wait for a connection is cut off from here. Once `work` is
    /// running its own result is returned, so a reply never disagrees with
    /// what was committed. `work` receives the deadline and enforces it inside
    /// SQLite, and lock waits are capped at whatever time is left.
    pub(crate) async fn interact<T, F>(&self, timeout: Duration, work: F) -> LimitResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, Instant) -> LimitResult<T> + Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let busy_timeout = self.busy_timeout;

        let conn = tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), self.pool.get())
            .await
            .map_err(|_| LimitError::Timeout)?
            .map_err(|e| LimitError::Connection(e.to_string()))?;

        conn.interact(move |conn| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            configure_connection(conn, busy_timeout.min(remaining))?;
            work(conn, deadline)
        })
        .await
        .map_err(|e| match e {
            InteractError::Panic(_) => {
                warn!("database worker panicked; connection discarded");
                LimitError::Connection("database worker panicked".to_string())
            }
            InteractError::Aborted => LimitError::Connection("database worker aborted".to_string()),
        })?
    }

    /// Closes the pool; connections checked out are dropped when returned.
    pub(crate) fn close(&self) {
        self.pool.close();
    }
}
