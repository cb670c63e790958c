use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use super::error::ApiError;
use super::trace::TraceId;
use super::{AppInfo, AppState};
use crate::db::PoolStats;
use crate::error::LimitError;
use crate::models::{LimitCheckRequest, LimitTransactionRecord, TransactionRecord};

fn decode<T>(trace_id: &TraceId, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::new(trace_id, LimitError::BadRequest(rejection.body_text())))
}

// ── Service info ──────────────────────────────────────────────

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "message": "true" }))
}

pub(crate) async fn live() -> Json<Value> {
    Json(json!({ "message": "true" }))
}

pub(crate) async fn app_info(State(state): State<AppState>) -> Json<AppInfo> {
    Json(state.info.as_ref().clone())
}

pub(crate) async fn header(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let echoed = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(echoed)
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestContext {
    trace_id: String,
    method: String,
    path: String,
    timeout_secs: u64,
}

pub(crate) async fn context(
    trace_id: TraceId,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Json<RequestContext> {
    Json(RequestContext {
        trace_id: trace_id.0,
        method: method.to_string(),
        path: uri.path().to_string(),
        timeout_secs: state.engine.request_timeout().as_secs(),
    })
}

pub(crate) async fn stat(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.engine.stat())
}

// ── Evaluation ────────────────────────────────────────────────

#[instrument(skip_all, fields(trace_id = %trace_id))]
pub(crate) async fn check_limit_transaction(
    trace_id: TraceId,
    State(state): State<AppState>,
    payload: Result<Json<LimitCheckRequest>, JsonRejection>,
) -> Result<Json<Vec<LimitTransactionRecord>>, ApiError> {
    let request = decode(&trace_id, payload)?;
    let verdicts = state
        .engine
        .check_limit(request)
        .await
        .map_err(|e| ApiError::new(&trace_id, e))?;
    info!(
        lines = verdicts.len(),
        breaches = verdicts.iter().filter(|v| v.status.is_breach()).count(),
        "limit check completed"
    );
    Ok(Json(verdicts))
}

#[instrument(skip_all, fields(trace_id = %trace_id))]
pub(crate) async fn transaction_limit(
    trace_id: TraceId,
    State(state): State<AppState>,
    payload: Result<Json<TransactionRecord>, JsonRejection>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let txn = decode(&trace_id, payload)?;
    let evaluated = state
        .engine
        .evaluate_transaction(txn)
        .await
        .map_err(|e| ApiError::new(&trace_id, e))?;
    info!(
        status = %evaluated.status,
        breach = evaluated.status.is_breach(),
        "transaction limit evaluated"
    );
    Ok(Json(evaluated))
}
