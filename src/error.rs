use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::ValidationError;

/// SessionError
///
/// Failures talking to the identity provider. These are outages, not per-request
/// conditions, so the gate lets them reach the top-level error response.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// RepositoryError
///
/// Anything the hosted database returns that is not a row.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A unique constraint refused the write (duplicate school code, student id number).
    #[error("conflicts with an existing record: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            _ => RepositoryError::Database(e),
        }
    }
}

/// AppError
///
/// The HTTP-facing error type. Handlers and the gate return `Result<_, AppError>`;
/// the `IntoResponse` impl is the console's single error boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Session(_) | AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Session(e) => {
                tracing::error!(error = %e, "identity provider call failed");
                "authentication service unavailable".to_string()
            }
            AppError::Repository(RepositoryError::Conflict(_)) => self.to_string(),
            AppError::Repository(e) => {
                tracing::error!(error = %e, "repository call failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
