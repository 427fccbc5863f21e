// ABOUTME: API error type mapping domain failures to HTTP responses
// ABOUTME: Produces machine-readable error codes with a per-response request id

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use wharf_sandbox::{FileError, SandboxError};

/// Error returned by every handler
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid workspace id: {0}")]
    InvalidWorkspaceId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path traversal attempt detected")]
    PathTraversal,

    #[error("Absolute path rejected: {0}")]
    AbsolutePath(String),

    #[error("Sandbox provisioning failed: {0}")]
    Provisioning(String),

    #[error("No free sandbox ports")]
    PortsExhausted,

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl AppError {
    fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::InvalidWorkspaceId(_) => (StatusCode::BAD_REQUEST, "INVALID_WORKSPACE_ID"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::PathTraversal => (StatusCode::FORBIDDEN, "PATH_TRAVERSAL"),
            AppError::AbsolutePath(_) => (StatusCode::BAD_REQUEST, "INVALID_PATH"),
            AppError::Provisioning(_) => (StatusCode::BAD_GATEWAY, "PROVISIONING_FAILED"),
            AppError::PortsExhausted => (StatusCode::SERVICE_UNAVAILABLE, "PORTS_EXHAUSTED"),
            AppError::Engine(_) => (StatusCode::BAD_GATEWAY, "ENGINE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message safe to show to clients
    fn to_user_message(&self) -> String {
        match self {
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            AppError::PathTraversal => "Path traversal detected and blocked".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (status_code, error_code) = self.to_status_and_code();

        match &self {
            AppError::Internal(err) => {
                error!(
                    request_id = %request_id,
                    error = %err,
                    "Internal server error occurred"
                );
            }
            AppError::Provisioning(_) | AppError::Engine(_) => {
                error!(
                    request_id = %request_id,
                    error_code = %error_code,
                    error = %self,
                    "Container engine failure"
                );
            }
            AppError::PathTraversal => {
                warn!(
                    request_id = %request_id,
                    audit = true,
                    "Path traversal attempt detected"
                );
            }
            _ => {
                info!(
                    request_id = %request_id,
                    error_code = %error_code,
                    error = %self,
                    "API error response"
                );
            }
        }

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: error_code.to_string(),
                message: self.to_user_message(),
            },
            request_id,
        };

        (status_code, Json(body)).into_response()
    }
}

impl From<SandboxError> for AppError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::InvalidWorkspaceId(id) => AppError::InvalidWorkspaceId(id),
            SandboxError::NotFound(id) => AppError::NotFound(format!("workspace {}", id)),
            SandboxError::NotRunning(id) => {
                AppError::NotFound(format!("running sandbox for workspace {}", id))
            }
            SandboxError::PortsExhausted { .. } => AppError::PortsExhausted,
            SandboxError::Provisioning { .. } => AppError::Provisioning(err.to_string()),
            SandboxError::Provider(e) => AppError::Engine(e.to_string()),
            SandboxError::Io(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::PathTraversal(_) => AppError::PathTraversal,
            FileError::AbsolutePath(path) => AppError::AbsolutePath(path),
            FileError::InvalidWorkspaceId(id) => AppError::InvalidWorkspaceId(id),
            FileError::NotFound(path) => AppError::NotFound(path),
            FileError::NotAFile(_) | FileError::NotADirectory(_) => {
                AppError::Validation(err.to_string())
            }
            FileError::Io(e) => AppError::Internal(e.into()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;
