use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Database errors ──────────────────────────────────────────────────────
    #[error("Database connection failed: {0}")]
    DatabaseConnectionFailed(#[source] sqlx::Error),

    #[error("Database query failed: {message}")]
    DatabaseQueryFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Storage failure: {message}")]
    Storage { message: String },

    // ── Model errors ─────────────────────────────────────────────────────────
    #[error("Server configuration error: {message}")]
    Configuration { message: String },

    #[error("{message}")]
    Upstream { message: String },

    #[error("Model did not respond within {seconds}s")]
    ModelTimeout { seconds: u64 },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    #[error("Invalid attachment: {reason}")]
    InvalidAttachment { reason: String },

    // ── Access errors ────────────────────────────────────────────────────────
    #[error("Not authorized")]
    Unauthorized,

    #[error("Conversation '{id}' not found")]
    ConversationNotFound { id: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn db_query(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::DatabaseQueryFailed { message: message.into(), source }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        AppError::ConversationNotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::ConversationNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyField { .. }
                | AppError::FieldTooLong { .. }
                | AppError::InvalidAttachment { .. }
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else if matches!(self, AppError::Unauthorized) {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Query text and driver details stay in the logs.
            AppError::DatabaseConnectionFailed(_)
            | AppError::DatabaseQueryFailed { .. }
            | AppError::Storage { .. }
            | AppError::Unexpected(_) => {
                error!(error = %self, "internal error");
                "Internal server error".to_owned()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            AppError::EmptyField { field_name: "message".into() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("abc").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Configuration { message: "API key not found".into() }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Upstream { message: "quota exceeded".into() }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let err = AppError::Upstream { message: "quota exceeded".into() };
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
