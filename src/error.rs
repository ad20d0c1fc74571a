//! Typed errors and HTTP mapping. Response bodies are plain text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table} column {column}")]
    InvalidPrimaryKey { table: String, column: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Access denied")]
    Forbidden,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    /// Database failure while performing `action` on `subject`, e.g. "retrieving" / "circuit".
    #[error("Error {action} {subject}")]
    Db {
        action: &'static str,
        subject: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Internal Server Error")]
    Internal(String),
}

impl AppError {
    pub fn db(action: &'static str, subject: &str, source: sqlx::Error) -> Self {
        AppError::Db {
            action,
            subject: subject.to_lowercase(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Db { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // details stay in the server log; clients only see the generic message
        match &self {
            AppError::Db { action, subject, source } => {
                tracing::error!(error = %source, "error {} {}", action, subject);
            }
            AppError::Internal(detail) => tracing::error!(error = %detail, "internal error"),
            AppError::Config(e) => tracing::error!(error = %e, "configuration error"),
            _ => {}
        }
        let message = match &self {
            AppError::Config(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}
