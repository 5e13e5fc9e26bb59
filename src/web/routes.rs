// Request handlers
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{info, warn};

use super::{html, AppState};
use crate::config::BYTES_PER_MB;
use crate::report::{build_report, REPORT_FILENAME, REPORT_MIME};
use crate::types::{AnalysisResult, NlpError};

const UPLOAD_FIELD: &str = "file";

struct Upload {
    name: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart, limit_bytes: usize) -> Result<Upload, NlpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit_bytes))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, limit_bytes))?;
        return Ok(Upload {
            name,
            bytes: bytes.to_vec(),
        });
    }
    Err(NlpError::InvalidUpload("no file was uploaded".into()))
}

// The body limit surfaces as a multipart stream error
fn upload_error(error: MultipartError, limit_bytes: usize) -> NlpError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        NlpError::UploadTooLarge {
            limit_mb: limit_bytes / BYTES_PER_MB,
        }
    } else {
        NlpError::InvalidUpload(error.body_text())
    }
}

fn status_for(error: &NlpError) -> StatusCode {
    match error {
        NlpError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
        NlpError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        NlpError::Pdf(_) | NlpError::EmptyText => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body for the API routes
pub struct ApiError(NlpError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<NlpError> for ApiError {
    fn from(error: NlpError) -> Self {
        Self(error)
    }
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(html::upload_page(&state.summarizer, &state.embedder))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn analyze_page(State(state): State<AppState>, multipart: Multipart) -> Response {
    let outcome = match read_upload(multipart, state.max_upload_bytes).await {
        Ok(upload) => {
            info!(
                "Analyzing {} ({} bytes)",
                upload.name.as_deref().unwrap_or("upload"),
                upload.bytes.len()
            );
            state.analyze(upload.bytes).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(analysis) => Html(html::results_page(&state.summarizer, &state.embedder, &analysis))
            .into_response(),
        Err(e) => {
            warn!("Upload rejected: {}", e);
            let page = html::error_page(&state.summarizer, &state.embedder, &e);
            (status_for(&e), Html(page)).into_response()
        }
    }
}

pub async fn analyze_json(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart, state.max_upload_bytes).await?;
    let analysis = state.analyze(upload.bytes).await?;
    Ok(Json(analysis).into_response())
}

/// Render an analysis already returned by `/api/analyze` as the report
/// download. Nothing is re-extracted or re-run.
pub async fn report_download(Json(result): Json<AnalysisResult>) -> Result<Response, ApiError> {
    let report = build_report(&result)?;
    let disposition = format!("attachment; filename=\"{}\"", REPORT_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, format!("{}; charset=utf-8", REPORT_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report,
    )
        .into_response())
}
