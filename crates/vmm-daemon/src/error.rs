use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use vmm_core::HypervisorError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<HypervisorError> for ApiError {
    fn from(err: HypervisorError) -> Self {
        match err {
            HypervisorError::UncontrolledVm(vm_id) => {
                ApiError::NotFound(format!("vmId {vm_id} is not controlled by this node"))
            }
            HypervisorError::PortUnavailable(port) => {
                ApiError::Conflict(format!("port {port} is not available"))
            }
            HypervisorError::NoPortsAvailable => {
                ApiError::Conflict("no ports available".to_string())
            }
            HypervisorError::UnknownOperatorCall(arg) => {
                ApiError::BadRequest(format!("unknown vmmSpecificCall argument: {arg}"))
            }
            HypervisorError::MonitorTimeout(vm_id) | HypervisorError::MonitorEarlyEof(vm_id) => {
                ApiError::Internal(format!("monitor dialogue failed for vmId {vm_id}: {err}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
