//! API server error types.
//!
//! Every failure the server answers itself is rendered as a Kubernetes
//! `Status` object so stock clients can surface the message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use polycluster_kernel::apis::{ApiError, StorageError};
use serde::Serialize;
use thiserror::Error;

/// Request-time errors of the API server.
#[derive(Debug, Error)]
pub enum ApiServerError {
    #[error("the server could not find the requested resource")]
    NotFound,

    /// Discovery lists the resource but no handler/storage is wired yet.
    #[error("not found request scope or resource storage for {0}")]
    NotWired(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{verb} is not supported on resources of kind {resource}")]
    MethodNotSupported { verb: String, resource: String },

    #[error("failed to resolve request info: {0}")]
    RequestInfo(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiServerError {
    fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            ApiServerError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
            ApiServerError::NotWired(_) => (StatusCode::NOT_IMPLEMENTED, "NotImplemented"),
            ApiServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiServerError::MethodNotSupported { .. } => {
                (StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed")
            }
            ApiServerError::RequestInfo(_) | ApiServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
            ApiServerError::Api(ApiError::NotAcceptable { .. }) => {
                (StatusCode::NOT_ACCEPTABLE, "NotAcceptable")
            }
            ApiServerError::Api(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiServerError::Storage(err) => match err {
                StorageError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
                StorageError::InvalidSelector(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
                StorageError::UnsupportedVerb(_) => {
                    (StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed")
                }
                StorageError::Unavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            },
        }
    }

    /// The `Status` body describing this error.
    pub fn status(&self) -> Status {
        let (code, reason) = self.status_and_reason();
        Status::failure(code, reason, self.to_string())
    }
}

impl IntoResponse for ApiServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = StatusCode::from_u16(status.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (code, Json(status)).into_response()
    }
}

/// Kubernetes `meta/v1` `Status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub status: &'static str,
    pub message: String,
    pub reason: &'static str,
    pub code: u16,
}

impl Status {
    pub fn failure(code: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: "Status",
            api_version: "v1",
            status: "Failure",
            message: message.into(),
            reason,
            code: code.as_u16(),
        }
    }
}

pub type ApiServerResult<T> = Result<T, ApiServerError>;
