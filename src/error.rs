use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("vendor protocol error: {0}")]
    Protocol(String),

    #[error("vendor returned no chart results for {0}")]
    EmptyResult(String),

    #[error("vendor request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AppError> },

    #[error("transaction error: {0}")]
    Transaction(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{cause} (recording the fetch log also failed: {audit})")]
    AuditWrite {
        cause: Box<AppError>,
        audit: Box<AppError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when this error, or the cause it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppError::Cancelled => true,
            AppError::RetriesExhausted { last, .. } => last.is_cancelled(),
            AppError::AuditWrite { cause, .. } => cause.is_cancelled(),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::SymbolNotFound(_) => (StatusCode::NOT_FOUND, "Symbol not found"),
            _ => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error retrieving market data",
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
