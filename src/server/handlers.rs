//! API endpoint handlers.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::analyst::DEFAULT_QUERY;
use crate::config::AnalyzeMode;
use crate::services::analyze::{dispatch_analysis, run_analysis};

use super::AppState;

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "message": "Financial Document Analyzer API is running" }))
}

/// Fields pulled out of the multipart form.
struct AnalyzeUpload {
    query: String,
    filename: String,
    payload: Vec<u8>,
}

/// Read the `file` and `query` fields from the multipart form.
///
/// `file` is required and must be non-empty; `query` defaults when absent or
/// blank and is trimmed before use.
async fn read_upload(mut multipart: Multipart) -> Result<AnalyzeUpload, String> {
    let mut query: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut payload: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("invalid multipart form: {}", e))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("query") => {
                query = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| format!("could not read query field: {}", e))?,
                );
            }
            Some("file") => {
                filename = field.file_name().map(|s| s.to_string());
                payload = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| format!("could not read file field: {}", e))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let payload = payload.ok_or_else(|| "missing file field".to_string())?;
    if payload.is_empty() {
        return Err("uploaded file is empty".to_string());
    }

    let query = query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    Ok(AnalyzeUpload {
        query,
        filename: filename.unwrap_or_else(|| "document.pdf".to_string()),
        payload,
    })
}

/// Analyze an uploaded financial document.
///
/// Which contract this endpoint honors is fixed at startup via
/// [`AnalyzeMode`]: synchronous deployments return the analysis (or the
/// fallback report), queued deployments acknowledge immediately and only log
/// the result. A model failure never produces an error response; only a
/// persistence failure does.
pub async fn analyze_document(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(detail) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response();
        }
    };

    match state.mode {
        AnalyzeMode::Sync => {
            match run_analysis(
                state.analyzer.as_ref(),
                &state.store,
                &upload.query,
                &upload.payload,
            )
            .await
            {
                Ok(analysis) => Json(json!({
                    "status": "success",
                    "query": upload.query,
                    "analysis": analysis,
                    "file_processed": upload.filename,
                }))
                .into_response(),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": format!("Error processing document: {}", e) })),
                )
                    .into_response(),
            }
        }
        AnalyzeMode::Queued => {
            match dispatch_analysis(
                state.analyzer.clone(),
                state.store.clone(),
                upload.query.clone(),
                &upload.payload,
            ) {
                Ok(()) => Json(json!({
                    "status": "processing",
                    "message": "Analysis started; results are written to the server logs",
                    "file_processed": upload.filename,
                }))
                .into_response(),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": format!("Error starting analysis: {}", e) })),
                )
                    .into_response(),
            }
        }
    }
}
