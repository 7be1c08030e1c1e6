//! Upload, form and health handlers.

use std::net::{IpAddr, SocketAddr};

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Html;
use axum::Json;

use crate::http::response::{HealthResponse, UploadResponse};
use crate::http::server::AppState;
use crate::intake::{FilePart, PipelineError, UploadRequest};

/// Form field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and part headers on top of the file cap.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

const UPLOAD_FORM: &str = include_str!("../../static/upload.html");

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rules: state.pipeline.rule_count(),
    })
}

/// `POST /upload`
pub async fn upload(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, PipelineError> {
    let client = addr.ip();
    let limit = state.pipeline.max_upload_bytes();

    // Refuse on the declared length before reading any of the body
    if let Some(declared) = content_length(&headers) {
        if declared > (limit + MULTIPART_OVERHEAD) as u64 {
            let error = PipelineError::SizeExceeded {
                limit,
                observed: Some(declared),
            };
            return refuse(&state, client, None, error);
        }
    }

    let file = match multipart {
        Ok(multipart) => match read_file_field(multipart).await {
            Ok(file) => file,
            Err((filename, error)) => {
                let error = transport_error(&error, limit);
                return refuse(&state, client, filename.as_deref(), error);
            }
        },
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Request is not a multipart form");
            return refuse(&state, client, None, PipelineError::MissingFilePart);
        }
    };

    let request = UploadRequest {
        client_addr: client,
        file,
    };
    let accepted = state.pipeline.clone().submit(request).await?;
    Ok(Json(accepted.into()))
}

fn refuse(
    state: &AppState,
    client: IpAddr,
    filename: Option<&str>,
    error: PipelineError,
) -> Result<Json<UploadResponse>, PipelineError> {
    let accepted = state.pipeline.refuse(client, filename, error)?;
    Ok(Json(accepted.into()))
}

/// Read the first `file` field; other fields are skipped.
async fn read_file_field(
    mut multipart: Multipart,
) -> Result<Option<FilePart>, (Option<String>, MultipartError)> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err((None, e)),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        return match field.bytes().await {
            Ok(data) => Ok(Some(FilePart::new(filename, data))),
            Err(e) => Err((Some(filename), e)),
        };
    }
}

/// Body-limit violations are size rejections; anything else means the
/// form could not be read.
fn transport_error(error: &MultipartError, limit: usize) -> PipelineError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::SizeExceeded {
            limit,
            observed: None,
        }
    } else {
        tracing::debug!(error = %error, "Malformed multipart body");
        PipelineError::MissingFilePart
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
