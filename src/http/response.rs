//! Error responses for the RPC routes.
//!
//! Service errors become a status code plus a JSON `{ "error": ... }` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::persist::PersistError;
use crate::pfs::PfsError;
use crate::pps::{JobError, PipelineError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn persist_status(e: &PersistError) -> StatusCode {
    match e {
        PersistError::NotFound { .. } => StatusCode::NOT_FOUND,
        PersistError::AlreadyExists { .. } => StatusCode::CONFLICT,
        PersistError::Connect { .. } | PersistError::Handshake(_) | PersistError::Io(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn pfs_status(e: &PfsError) -> StatusCode {
    match e {
        PfsError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = match &e {
            JobError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            JobError::Persist(p) => persist_status(p),
        };
        Self::new(status, e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PipelineError::Persist(p) => persist_status(p),
            PipelineError::Pfs(p) => pfs_status(p),
            PipelineError::Job(JobError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Job(JobError::Persist(p)) => persist_status(p),
        };
        Self::new(status, e.to_string())
    }
}
