//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use saga::{ErrorKind, SagaError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga or payment orchestration error.
    Saga(SagaError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": msg }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, serde_json::Value) {
    let message = err.to_string();

    // Gateway rejections of the request itself are passed on with their status.
    if let SagaError::Gateway(gateway) = &err
        && gateway.is_client_error()
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            serde_json::json!({ "error": message, "gateway_status": gateway.status }),
        );
    }

    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::RemoteFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => {
            tracing::error!(error = %message, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, serde_json::json!({ "error": message }))
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::UnknownStatus(status) => {
                ApiError::BadRequest(format!("Unknown status: {status}"))
            }
            other => ApiError::Saga(SagaError::Domain(other)),
        }
    }
}
