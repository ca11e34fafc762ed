use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field name → list of human-readable messages, in field declaration order.
pub type FieldErrors = IndexMap<&'static str, Vec<String>>;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("disallowed host: {0}")]
    DisallowedHost(String),

    #[error("not found")]
    NotFound,

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidPayload(_)
            | AppError::BadRequest(_)
            | AppError::DisallowedHost(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!(errors),
            AppError::InvalidPayload(msg) => json!({ "non_field_errors": [msg] }),
            AppError::BadRequest(msg) | AppError::UnsupportedMediaType(msg) => {
                json!({ "detail": msg })
            }
            AppError::DisallowedHost(host) => {
                json!({ "detail": format!("Invalid HTTP_HOST header: '{}'.", host) })
            }
            AppError::NotFound => json!({ "detail": "Not found." }),
            AppError::Database(ref e) => {
                error!(error = %e, "Database error");
                json!({ "detail": "A server error occurred." })
            }
            AppError::Internal(ref e) => {
                error!(error = %e, "Internal error");
                json!({ "detail": "A server error occurred." })
            }
        };

        (status, Json(body)).into_response()
    }
}
