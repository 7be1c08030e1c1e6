//! Response bodies and error mapping.
//!
//! # Design Decisions
//! - Client-attributable failures are 400 with a fixed message
//! - Storage faults are 500 and never expose paths or error detail

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::intake::{AcceptedUpload, PipelineError};

const UPLOAD_SUCCESS: &str = "File uploaded successfully";

/// Body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    /// Generated storage name.
    pub filename: String,
    /// Sniffed media type.
    pub mime_type: String,
}

impl From<AcceptedUpload> for UploadResponse {
    fn from(accepted: AcceptedUpload) -> Self {
        Self {
            message: UPLOAD_SUCCESS.to_string(),
            filename: accepted.stored_name,
            mime_type: accepted.media_type.to_string(),
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rules: usize,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
