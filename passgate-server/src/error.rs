//! Errors returned by HTTP handlers
//!
//! Maps ceremony failures onto HTTP responses. Internal details are logged;
//! clients only see a sanitized message and a stable error code. Every
//! verification, unknown-credential and counter failure renders the same
//! body so a caller cannot tell which check rejected it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passgate_core::CeremonyError;
use thiserror::Error;

/// Handler failure, rendered as `{"error", "code"}` JSON
#[derive(Debug, Error)]
pub enum ApiError {
    /// Anything the client cannot fix
    #[error("Internal error: {0}")]
    Internal(String),

    /// Ceremony error from the orchestrator
    #[error(transparent)]
    Ceremony(#[from] CeremonyError),
}

impl ApiError {
    /// Wrap an unexpected failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Response status
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ceremony(e) => match e {
                CeremonyError::MalformedEncoding(_)
                | CeremonyError::NoPendingChallenge
                | CeremonyError::ChallengeExpired
                | CeremonyError::IncompleteIdentity
                | CeremonyError::InvalidRequest(_)
                | CeremonyError::UserCancelled => StatusCode::BAD_REQUEST,

                CeremonyError::RegistrationFailed(_)
                | CeremonyError::AssertionFailed(_)
                | CeremonyError::CounterRegression { .. }
                | CeremonyError::UnknownCredential => StatusCode::UNAUTHORIZED,

                CeremonyError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,

                CeremonyError::Config(_)
                | CeremonyError::Entropy(_)
                | CeremonyError::Transport(_)
                | CeremonyError::Platform(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Ceremony(e) => match e {
                CeremonyError::MalformedEncoding(_) => "MALFORMED_ENCODING",
                CeremonyError::NoPendingChallenge => "NO_PENDING_CHALLENGE",
                CeremonyError::ChallengeExpired => "CHALLENGE_EXPIRED",
                CeremonyError::IncompleteIdentity => "INCOMPLETE_IDENTITY",
                CeremonyError::InvalidRequest(_) => "INVALID_INPUT",
                CeremonyError::UserCancelled => "USER_CANCELLED",
                CeremonyError::RegistrationFailed(_) => "REGISTRATION_FAILED",
                CeremonyError::AssertionFailed(_)
                | CeremonyError::CounterRegression { .. }
                | CeremonyError::UnknownCredential => "AUTHENTICATION_FAILED",
                CeremonyError::Store(_) => "STORE_UNAVAILABLE",
                CeremonyError::Config(_)
                | CeremonyError::Entropy(_)
                | CeremonyError::Transport(_)
                | CeremonyError::Platform(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Message safe to show the client
    fn client_message(&self) -> String {
        match self {
            Self::Ceremony(e) => match e {
                CeremonyError::MalformedEncoding(inner) => inner.to_string(),
                CeremonyError::NoPendingChallenge => {
                    "No ceremony in progress; request new options".to_string()
                }
                CeremonyError::ChallengeExpired => {
                    "Challenge expired; request new options".to_string()
                }
                CeremonyError::IncompleteIdentity => "Session has no user identity".to_string(),
                CeremonyError::InvalidRequest(message) => message.clone(),
                CeremonyError::UserCancelled => "Ceremony cancelled".to_string(),
                CeremonyError::RegistrationFailed(_) => "Registration failed".to_string(),
                CeremonyError::AssertionFailed(_)
                | CeremonyError::CounterRegression { .. }
                | CeremonyError::UnknownCredential => "Authentication failed".to_string(),
                CeremonyError::Store(_) => "Credential store unavailable".to_string(),
                CeremonyError::Config(_)
                | CeremonyError::Entropy(_)
                | CeremonyError::Transport(_)
                | CeremonyError::Platform(_) => "Internal server error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Coarse category recorded in logs
    fn error_category(&self) -> &'static str {
        match self {
            Self::Internal(_) => "internal",
            Self::Ceremony(_) => "ceremony",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Internal details go to the log, never the response
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Ceremony rejected"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
