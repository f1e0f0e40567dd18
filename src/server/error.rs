use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::install::StartError;

/// Errors returned by the HTTP handlers as `{ error, errorCode }`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing caller identity or bad bearer token.
    Unauthorized,
    /// Unknown installation id, or one owned by another user.
    NotFound,
    /// The install request was not admitted.
    Start(StartError),
    /// A collaborator failed while serving a status or cancel request.
    Internal {
        /// Text shown to the caller.
        message: &'static str,
        /// Symbolic code.
        code: &'static str,
        /// Logged, never returned.
        source: anyhow::Error,
    },
}

impl ApiError {
    pub(crate) fn internal<E: Into<anyhow::Error>>(
        message: &'static str,
        code: &'static str,
        err: E,
    ) -> Self {
        Self::Internal {
            message,
            code,
            source: err.into(),
        }
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        Self::Start(err)
    }
}

fn start_status(err: &StartError) -> (StatusCode, &'static str) {
    match err {
        StartError::MissingPassword => (StatusCode::BAD_REQUEST, "MISSING_PASSWORD"),
        StartError::Unpipeable => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        StartError::ListNotFound => (StatusCode::NOT_FOUND, "LIST_NOT_FOUND"),
        StartError::NoValidApps => (StatusCode::BAD_REQUEST, "NO_VALID_APPS"),
        StartError::InvalidCommands => (StatusCode::BAD_REQUEST, "INVALID_COMMANDS"),
        StartError::InvalidPassword => (StatusCode::FORBIDDEN, "INVALID_PASSWORD"),
        StartError::Catalog(_) | StartError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INSTALLATION_FAILED")
        }
    }
}

fn body(status: StatusCode, error: &str, code: &str) -> Response {
    (status, Json(json!({ "error": error, "errorCode": code }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => body(
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                "UNAUTHORIZED",
            ),
            Self::NotFound => body(StatusCode::NOT_FOUND, "Installation not found", "NOT_FOUND"),
            Self::Start(err) => {
                let (status, code) = start_status(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "installation failed to start");
                    return body(status, "Installation failed to start", code);
                }
                body(status, &err.to_string(), code)
            }
            Self::Internal {
                message,
                code,
                source,
            } => {
                tracing::error!("HTTP handler error: {source:#}");
                body(StatusCode::INTERNAL_SERVER_ERROR, message, code)
            }
        }
    }
}
