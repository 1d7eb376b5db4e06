//! Maps `biexec_core::ExecutionError` to an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use biexec_core::ExecutionError;
use serde::Serialize;

/// Thin wrapper so the core error type can implement `IntoResponse` without
/// `biexec-core` taking a dependency on axum.
pub struct ApiError(pub ExecutionError);

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ExecutionError::CompileError(_)
            | ExecutionError::ContractViolation(_)
            | ExecutionError::ImportBlocked { .. }
            | ExecutionError::PermissionDenied(_) => StatusCode::BAD_REQUEST,
            ExecutionError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            ExecutionError::RuntimeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody { error: self.0.to_string(), kind: self.0.kind() };
        tracing::warn!(kind = body.kind, status = status.as_u16(), "execution request failed");
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn timeout_maps_to_408() {
        let response = ApiError(ExecutionError::Timeout { timeout_seconds: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn contract_violation_maps_to_400() {
        let response =
            ApiError(ExecutionError::ContractViolation("bad shape".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn runtime_error_maps_to_500() {
        let response = ApiError(ExecutionError::RuntimeError("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
