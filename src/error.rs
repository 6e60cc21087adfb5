//! Application error type and the request extractors that feed it.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl below is the
//! single place where domain failures become an HTTP status plus `{"error": ...}` body.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    models::ErrorResponse, password::PasswordError, repository::RepoError, token::TokenError,
};

/// Boundary-facing error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Username collision on registration
    #[error("Username already exists")]
    DuplicateUsername,

    /// Bad credentials or a missing, invalid or expired token
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Role not allowed on this route
    #[error("Access denied")]
    Forbidden,

    /// Absent, or owned by someone else
    #[error("{0}")]
    NotFound(&'static str),

    /// Hashing, signing or storage failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUsername => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(detail) => {
                // Details stay in the logs; the client gets a generic message.
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateUsername => AppError::DuplicateUsername,
            RepoError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Unauthenticated("Token expired"),
            TokenError::Invalid(reason) => {
                tracing::debug!(%reason, "rejected session token");
                AppError::Unauthenticated("Invalid token")
            }
            TokenError::Signing(e) => AppError::Internal(e),
        }
    }
}

// --- Extractors ---

/// AppJson
///
/// `axum::Json` with its rejection mapped to `AppError::Validation`, so malformed bodies,
/// missing fields and unknown enum values all answer 400 with the standard error body.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

/// AppPath
///
/// `axum::extract::Path` with the same rejection mapping (e.g. `/todos/abc`).
pub struct AppPath<T>(pub T);

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}
