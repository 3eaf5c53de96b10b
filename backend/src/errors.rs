use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// ModelError
///
/// Outcomes of a record store call. The first three variants are expected, domain-level
/// results that handlers branch on; the remaining ones are faults.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no matching record found")]
    NoRecord,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ModelError {
    /// True for the variants a handler is expected to handle as normal control flow.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            ModelError::NoRecord | ModelError::DuplicateEmail | ModelError::InvalidCredentials
        )
    }
}

/// AppError
///
/// The error type returned by handlers and pipeline stages. Converting it into a response
/// is the single place where faults get logged, so every stage can simply use `?`.
#[derive(Debug, Error)]
pub enum AppError {
    /// A well-defined client error (400/403/404/405...). Never logged as a fault.
    #[error("client error: {0}")]
    Client(StatusCode),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found() -> Self {
        AppError::Client(StatusCode::NOT_FOUND)
    }

    pub fn bad_request() -> Self {
        AppError::Client(StatusCode::BAD_REQUEST)
    }
}

fn status_text(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Unknown Error");
    (status, reason).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Client(status) => status_text(status),
            // A missing record reaching this point means the handler chose "not found".
            AppError::Model(ModelError::NoRecord) => status_text(StatusCode::NOT_FOUND),
            fault => {
                tracing::error!(error = ?fault, "server error: {}", fault);
                status_text(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
