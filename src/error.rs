//! Error kinds surfaced by the limit engine.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("item not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("bad request ! check parameters: {0}")]
    BadRequest(String),

    #[error("timeout: context deadline exceeded")]
    Timeout,

    #[error("database connection unavailable: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Persistence(#[source] rusqlite::Error),
}

pub type LimitResult<T> = Result<T, LimitError>;

impl LimitError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    #[cfg(test)]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status the boundary reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::BadRequest(_) => 400,
            Self::Timeout | Self::Connection(_) | Self::Persistence(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for LimitError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => Self::Timeout,
            _ => Self::Persistence(err),
        }
    }
}
