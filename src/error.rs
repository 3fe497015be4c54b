//! Error types for socialgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` and renders a generic HTML error page.
//! Internal detail only ever reaches the server log.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Route did not match (404)
    #[error("Resource not found")]
    NotFound,

    /// Provider key is not registered (404)
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// OAuth exchange failed or was rejected (400/502)
    #[error("Authentication failed: {0}")]
    AuthExchange(#[from] AuthFailure),

    /// Page could not be rendered (500)
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration error (500, fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing/verification primitive failed (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Why a login could not be completed
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// CSRF state missing, expired, or not matching the callback
    #[error("invalid or expired login state")]
    InvalidState,

    /// Provider redirected back with an error (e.g. user pressed "deny")
    #[error("provider returned error: {0}")]
    Denied(String),

    /// Token or profile request failed
    #[error("provider exchange failed: {0}")]
    Upstream(String),
}

impl AuthFailure {
    fn public_message(&self) -> &'static str {
        match self {
            AuthFailure::InvalidState => {
                "Your login request expired or could not be verified. Please try again."
            }
            AuthFailure::Denied(_) => "The provider did not authorize the login.",
            AuthFailure::Upstream(_) => "The provider could not complete the login. Please try again.",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::fmt::Error> for AppError {
    fn from(err: std::fmt::Error) -> Self {
        AppError::Render(err.to_string())
    }
}

impl AppError {
    /// Status code, public message and metric label for this error
    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Page not found.", "not_found"),
            AppError::UnknownProvider(_) => (
                StatusCode::NOT_FOUND,
                "This login provider is not available.",
                "unknown_provider",
            ),
            AppError::AuthExchange(failure) => {
                let status = match failure {
                    AuthFailure::InvalidState | AuthFailure::Denied(_) => StatusCode::BAD_REQUEST,
                    AuthFailure::Upstream(_) => StatusCode::BAD_GATEWAY,
                };
                (status, failure.public_message(), "auth_exchange")
            }
            AppError::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.",
                "render",
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.",
                "config",
            ),
            AppError::Encryption(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.",
                "encryption",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.",
                "internal",
            ),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to a status code and a generic HTML page.
    fn into_response(self) -> Response {
        let (status, public_message, error_type) = self.classify();

        match &self {
            AppError::NotFound | AppError::UnknownProvider(_) => {
                tracing::debug!(error = %self, "Request rejected");
            }
            AppError::AuthExchange(_) => {
                tracing::warn!(error = %self, "Login failed");
            }
            _ => {
                tracing::error!(error = %self, "Request failed");
            }
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        (status, Html(crate::view::error_page(status, public_message))).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
