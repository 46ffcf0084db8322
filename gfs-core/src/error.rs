//! # Error Types
//!
//! Client-facing and internal error taxonomy for the GFS-style coordination
//! layer, translated to the HTTP status codes returned by each handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while serving a client request on a master or
/// chunkserver.
///
/// Internal peer-to-peer failures (election messages, heartbeats,
/// replication fan-out, clock sync, secondary commit fan-out) never surface
/// through this type. They are swallowed at the call site and logged instead.
#[derive(Error, Debug)]
pub enum GfsError {
    /// A mutating request landed on a non-leader master.
    #[error("not leader")]
    NotLeader,

    /// `/file/create` found no live chunkserver after the startup wait.
    #[error("no chunkservers available")]
    NoServersAvailable,

    /// ACL check rejected the request.
    #[error("permission denied")]
    PermissionDenied,

    /// Referenced file, chunk, user, or permission request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Login failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Unique-key violation (e.g. username already registered).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Commit requested for a handle with nothing staged.
    #[error("no staged data for chunk")]
    NoStagedData,

    /// Local durable-store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, GfsError>;

impl From<rusqlite::Error> for GfsError {
    fn from(err: rusqlite::Error) -> Self {
        GfsError::Storage(err.to_string())
    }
}

impl GfsError {
    fn status_code(&self) -> StatusCode {
        match self {
            GfsError::NotLeader => StatusCode::BAD_REQUEST,
            GfsError::NoServersAvailable => StatusCode::SERVICE_UNAVAILABLE,
            GfsError::PermissionDenied => StatusCode::FORBIDDEN,
            GfsError::NotFound(_) => StatusCode::NOT_FOUND,
            GfsError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GfsError::Duplicate(_) => StatusCode::BAD_REQUEST,
            GfsError::NoStagedData => StatusCode::BAD_REQUEST,
            GfsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GfsError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GfsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
