use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carebase_core::ServiceError;
use serde_json::json;
use tracing::error;

/// Errors returned from handlers and the auth middleware.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    BadRequest(String),
    Unauthorized(String),
    MissingPermission(String),
    /// Server-side misconfiguration or an unreachable key endpoint.
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::InvalidInput(v) => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": v.message,
                        "code": v.code,
                        "details": v.details,
                    })),
                )
                    .into_response(),
                ServiceError::OwnerNotFound { .. } => {
                    error_body(StatusCode::NOT_FOUND, "Patient not found")
                }
                e @ ServiceError::EntryNotFound { .. } => {
                    error_body(StatusCode::NOT_FOUND, e.to_string())
                }
                ServiceError::Forbidden => error_body(StatusCode::FORBIDDEN, "Forbidden"),
                ServiceError::AuthorizationFailed(detail) => {
                    error!(error = %detail, "Authorization check failed");
                    error_body(StatusCode::BAD_GATEWAY, "Authorization check failed")
                }
                ServiceError::Conflict(field) => {
                    error_body(StatusCode::CONFLICT, format!("Conflict: {} already exists", field))
                }
                ServiceError::Internal(detail) => {
                    error!(error = %detail, "Internal error");
                    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            },
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => error_body(StatusCode::UNAUTHORIZED, msg),
            ApiError::MissingPermission(msg) => error_body(StatusCode::FORBIDDEN, msg),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
