use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures reported by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("user {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Outcome taxonomy of the user directory. Every command resolves to
/// success or exactly one of these.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid payload: {0}")]
    MalformedInput(String),
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("email already registered: {0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(email) => UserError::Conflict(email),
            StoreError::NotFound(id) => UserError::NotFound(id),
            StoreError::Database(e) => UserError::Internal(e.into()),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            UserError::MalformedInput(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg }),
            ),
            UserError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "user not found", "id": id }),
            ),
            UserError::Conflict(email) => (
                StatusCode::CONFLICT,
                json!({ "error": "email already registered", "email": email }),
            ),
            UserError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
