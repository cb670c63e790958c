use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{self, AppInfo, AppState};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::engine::LimitEngine;

pub(crate) fn serve(config: &AppConfig, db_path: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_server(config, db_path))
}

async fn run_server(config: &AppConfig, db_path: &Path) -> Result<()> {
    let pool = DbPool::open(db_path, config.pool_max_size, config.busy_timeout())?;
    let engine = LimitEngine::new(pool, config.request_timeout());
    let state = AppState::new(engine.clone(), AppInfo::from_config(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        %addr,
        database = %db_path.display(),
        pool_max_size = config.pool_max_size,
        timeout_secs = config.ctx_timeout_secs,
        "limitguard listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    engine.close();
    info!("limitguard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received; draining requests");
}
