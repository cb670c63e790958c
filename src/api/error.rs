use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use super::trace::TraceId;
use crate::error::LimitError;

/// An engine error bound to the request it failed.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub trace_id: TraceId,
    pub error: LimitError,
}

impl ApiError {
    pub(crate) fn new(trace_id: &TraceId, error: LimitError) -> Self {
        Self {
            trace_id: trace_id.clone(),
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    trace_id: String,
    status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(trace_id = %self.trace_id, error = %self.error, "request failed");
        } else {
            warn!(trace_id = %self.trace_id, error = %self.error, "request rejected");
        }

        let body = ErrorBody {
            error: self.error.to_string(),
            trace_id: self.trace_id.0,
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
