// src/rpc/envelope.rs

//! The `{status, code}` error envelope every administrative RPC response
//! carries (spec.md §6). Grounded on the teacher's JSON error body used by
//! its own HTTP-facing admin endpoints; `CatalogError::code()` already
//! enumerates the taxonomy spec.md §7 names, so the envelope just surfaces
//! it alongside a human message and the right HTTP status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::core::errors::CatalogError;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

pub struct ApiError(pub CatalogError);

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError(e)
    }
}

fn http_status(err: &CatalogError) -> StatusCode {
    match err {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::AlreadyPresent { .. } => StatusCode::CONFLICT,
        CatalogError::InvalidArgument(_) | CatalogError::InvalidSchema(_) | CatalogError::InvalidReplicationInfo(_) => {
            StatusCode::BAD_REQUEST
        }
        CatalogError::NotLeader => StatusCode::MISDIRECTED_REQUEST,
        CatalogError::ServiceUnavailable(_) | CatalogError::TryAgain(_) => StatusCode::SERVICE_UNAVAILABLE,
        CatalogError::IllegalState(_)
        | CatalogError::InTransition(_)
        | CatalogError::NamespaceNotEmpty(_)
        | CatalogError::ReplicationFactorTooHigh { .. }
        | CatalogError::TooManyTablets { .. }
        | CatalogError::NotSupported(_)
        | CatalogError::ReachedSplitLimit(_)
        | CatalogError::SplitOrBackfillInProgress(_) => StatusCode::CONFLICT,
        CatalogError::Corruption(_) | CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = http_status(&self.0);
        let body = ErrorEnvelope {
            status: "error",
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
