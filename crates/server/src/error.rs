//! Authentication errors and the HTTP error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_registry::RegistryError;
use serde_json::json;
use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password.
    ///
    /// The two cases are deliberately indistinguishable so the response
    /// carries no username-enumeration signal.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists but is banned from authenticating.
    #[error("Account has been banned")]
    AccountBanned,

    /// No bearer token was presented.
    #[error("Authentication required")]
    Unauthenticated,

    /// The presented token is malformed, has a bad signature, or expired.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The caller is authenticated but lacks the admin role.
    #[error("Admin access required")]
    Forbidden,

    /// Token signing failed.
    #[error("Failed to issue token")]
    TokenIssue(#[source] jsonwebtoken::errors::Error),

    /// Password hashing or hash parsing failed.
    #[error("Password hashing failed")]
    PasswordHash,

    /// An underlying registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        // Every verification failure collapses into InvalidToken; the
        // distinction is logged, not surfaced.
        match err.kind() {
            ErrorKind::ExpiredSignature => {
                tracing::debug!("rejected expired token");
                AuthError::InvalidToken
            },
            _ => {
                tracing::debug!(error = %err, "rejected token");
                AuthError::InvalidToken
            },
        }
    }
}

/// HTTP error envelope: a status code plus a `{"error": …}` JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates an error response with the given status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountBanned => StatusCode::FORBIDDEN,
            // Missing token is 401; a presented-but-invalid token and a
            // role failure are both 403.
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::TokenIssue(_) | AuthError::PasswordHash => {
                tracing::error!(error = %err, "internal auth failure");
                StatusCode::INTERNAL_SERVER_ERROR
            },
            AuthError::Registry(inner) => return registry_error_response(inner),
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        registry_error_response(&err)
    }
}

fn registry_error_response(err: &RegistryError) -> ApiError {
    match err {
        RegistryError::MissingKey
        | RegistryError::InvalidKey
        | RegistryError::UsernameTaken
        | RegistryError::EmptyContent => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
        RegistryError::NotFound { .. } => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
        RegistryError::Storage(inner) => {
            // Storage details are logged, never surfaced to the caller.
            tracing::error!(error = %inner, "storage failure");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
        },
    }
}
