//! HTTP surface of the limit engine.

mod error;
mod handlers;
mod trace;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::engine::LimitEngine;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AppInfo {
    pub app_name: String,
    pub version: String,
    pub pod_name: String,
    pub env: String,
    pub port: u16,
}

impl AppInfo {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            version: config.api_version.clone(),
            pod_name: config.pod_name.clone(),
            env: config.env.clone(),
            port: config.port,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub engine: LimitEngine,
    pub info: Arc<AppInfo>,
}

impl AppState {
    pub(crate) fn new(engine: LimitEngine, info: AppInfo) -> Self {
        Self {
            engine,
            info: Arc::new(info),
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::app_info))
        .route("/info", get(handlers::app_info))
        .route("/health", get(handlers::health))
        .route("/live", get(handlers::live))
        .route("/header", get(handlers::header))
        .route("/context", get(handlers::context))
        .route("/stat", get(handlers::stat))
        .route("/checkLimitTransaction", post(handlers::check_limit_transaction))
        .route("/transactionLimit", post(handlers::transaction_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
