use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use handoff_core::HandoffError;
use serde::Serialize;

/// Page the browser lands on when a redirect route fails
pub const ERROR_PAGE: &str = "/error";

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Identity provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Unable to load identity profile: {0}")]
    ProfileFetchFailed(String),

    #[error("Account already linked to social identity")]
    AlreadyLinked,

    #[error("Login is already in progress for this challenge")]
    SessionExists,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::ProviderNotFound(_) => (StatusCode::NOT_FOUND, "PROVIDER_NOT_FOUND"),
            ApiError::ProfileFetchFailed(_) => (StatusCode::BAD_GATEWAY, "PROFILE_FETCH_FAILED"),
            ApiError::AlreadyLinked => (StatusCode::CONFLICT, "ALREADY_LINKED"),
            ApiError::SessionExists => (StatusCode::CONFLICT, "SESSION_EXISTS"),
            ApiError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Stable error code shown to clients
    pub fn code(&self) -> &'static str {
        self.status_and_code().1
    }

    fn log(&self) {
        match self {
            ApiError::Internal(err) => tracing::error!("Internal error: {:?}", err),
            ApiError::Upstream(msg) | ApiError::ProfileFetchFailed(msg) => {
                tracing::warn!(code = self.code(), "Upstream failure: {}", msg)
            }
            other => tracing::debug!(code = other.code(), "Request failed: {}", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

impl From<HandoffError> for ApiError {
    fn from(error: HandoffError) -> Self {
        match error {
            HandoffError::NotFound(msg) => ApiError::NotFound(msg),
            HandoffError::ApplicationNotFound(id) => {
                ApiError::NotFound(format!("application {}", id))
            }
            HandoffError::SessionExists => ApiError::SessionExists,
            HandoffError::ProviderNotFound(name) => ApiError::ProviderNotFound(name),
            HandoffError::ProfileFetchFailed(msg) => ApiError::ProfileFetchFailed(msg),
            HandoffError::AlreadyLinked => ApiError::AlreadyLinked,
            HandoffError::InvalidState(msg) => ApiError::InvalidState(msg),
            HandoffError::Conflict(msg) => ApiError::Conflict(msg),
            HandoffError::InvalidForwardState(msg) | HandoffError::InvalidRequest(msg) => {
                ApiError::InvalidRequest(msg)
            }
            HandoffError::AuthorizationServer(msg) | HandoffError::Notification(msg) => {
                ApiError::Upstream(msg)
            }
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

/// Error of a browser-facing route, answered with a redirect to the error page
#[derive(Debug)]
pub struct RedirectError(pub ApiError);

impl From<ApiError> for RedirectError {
    fn from(error: ApiError) -> Self {
        RedirectError(error)
    }
}

impl From<HandoffError> for RedirectError {
    fn from(error: HandoffError) -> Self {
        RedirectError(error.into())
    }
}

impl IntoResponse for RedirectError {
    fn into_response(self) -> Response {
        self.0.log();
        Redirect::temporary(&format!("{}?code={}", ERROR_PAGE, self.0.code())).into_response()
    }
}
