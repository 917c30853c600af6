//! Web server exposing the financial document analysis API.
//!
//! Two endpoints: a health probe at `/` and the multipart upload endpoint at
//! `/analyze`. The analyze contract (synchronous or queued) is fixed when
//! the router is built and never changes at runtime.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::analyst::{DocumentAnalyzer, FinancialAnalyst};
use crate::config::{AnalyzeMode, Settings};
use crate::storage::DocumentStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub store: DocumentStore,
    pub mode: AnalyzeMode,
}

impl AppState {
    pub fn new(settings: &Settings, mode: AnalyzeMode) -> Self {
        Self {
            analyzer: Arc::new(FinancialAnalyst::new(settings.llm.clone())),
            store: DocumentStore::new(settings.storage_dir()),
            mode,
        }
    }
}

/// Start the web server.
pub async fn serve(
    settings: &Settings,
    host: &str,
    port: u16,
    mode: AnalyzeMode,
) -> anyhow::Result<()> {
    let state = AppState::new(settings, mode);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::analyst::DEFAULT_QUERY;
    use crate::llm::LlmError;

    /// Analyzer that reads the stored file and reports what it saw.
    struct PeekingAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for PeekingAnalyzer {
        async fn analyze(&self, query: &str, path: &Path) -> Result<String, LlmError> {
            let bytes = std::fs::read(path).map_err(|e| LlmError::Api(e.to_string()))?;
            Ok(format!("analyzed {} bytes for query: {}", bytes.len(), query))
        }
    }

    /// Analyzer that always fails, standing in for a model timeout.
    struct FailingAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _query: &str, _path: &Path) -> Result<String, LlmError> {
            Err(LlmError::Connection("simulated timeout".to_string()))
        }
    }

    fn test_app(
        analyzer: Arc<dyn DocumentAnalyzer>,
        storage_root: PathBuf,
        mode: AnalyzeMode,
    ) -> axum::Router {
        create_router(AppState {
            analyzer,
            store: DocumentStore::new(storage_root),
            mode,
        })
    }

    const BOUNDARY: &str = "finlens-test-boundary";

    /// Build a multipart/form-data body with optional query and file parts.
    fn multipart_body(query: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(q) = query {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"query\"\r\n\r\n{q}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn analyze_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn stored_files(root: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn health_returns_fixed_message() {
        let dir = tempdir().unwrap();
        let app = test_app(
            Arc::new(FailingAnalyzer),
            dir.path().to_path_buf(),
            AnalyzeMode::Sync,
        );

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Financial Document Analyzer API is running");
    }

    #[tokio::test]
    async fn analyze_sync_returns_analysis_and_cleans_up() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("uploads");
        let app = test_app(Arc::new(PeekingAnalyzer), root.clone(), AnalyzeMode::Sync);

        let body = multipart_body(Some("How is revenue?"), Some(("sample.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["query"], "How is revenue?");
        assert_eq!(json["file_processed"], "sample.pdf");
        assert_eq!(json["analysis"], "analyzed 8 bytes for query: How is revenue?");

        assert!(stored_files(&root).is_empty());
    }

    #[tokio::test]
    async fn analyze_sync_model_failure_returns_fallback_not_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("uploads");
        let app = test_app(Arc::new(FailingAnalyzer), root.clone(), AnalyzeMode::Sync);

        let body = multipart_body(Some("Summarize risk"), Some(("sample.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "success");
        let analysis = json["analysis"].as_str().unwrap();
        assert!(analysis.contains("Fallback Mode"));
        assert!(analysis.contains("Summarize risk"));

        assert!(stored_files(&root).is_empty());
    }

    #[tokio::test]
    async fn analyze_defaults_query_when_absent() {
        let dir = tempdir().unwrap();
        let app = test_app(
            Arc::new(PeekingAnalyzer),
            dir.path().join("uploads"),
            AnalyzeMode::Sync,
        );

        let body = multipart_body(None, Some(("report.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["query"], DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn analyze_trims_whitespace_query() {
        let dir = tempdir().unwrap();
        let app = test_app(
            Arc::new(PeekingAnalyzer),
            dir.path().join("uploads"),
            AnalyzeMode::Sync,
        );

        let body = multipart_body(Some("  Summarize risk  "), Some(("r.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        let json = json_body(response).await;
        assert_eq!(json["query"], "Summarize risk");
    }

    #[tokio::test]
    async fn analyze_missing_file_field_is_rejected() {
        let dir = tempdir().unwrap();
        let app = test_app(
            Arc::new(PeekingAnalyzer),
            dir.path().join("uploads"),
            AnalyzeMode::Sync,
        );

        let body = multipart_body(Some("query only"), None);
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn analyze_empty_file_is_rejected() {
        let dir = tempdir().unwrap();
        let app = test_app(
            Arc::new(PeekingAnalyzer),
            dir.path().join("uploads"),
            AnalyzeMode::Sync,
        );

        let body = multipart_body(None, Some(("empty.pdf", b"")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn analyze_persistence_failure_returns_500_with_cause() {
        let dir = tempdir().unwrap();
        // A file where the storage directory should be makes save() fail.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"file in the way").unwrap();

        let app = test_app(Arc::new(PeekingAnalyzer), blocked, AnalyzeMode::Sync);

        let body = multipart_body(None, Some(("sample.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        let detail = json["detail"].as_str().unwrap();
        assert!(detail.starts_with("Error processing document:"));
        assert!(detail.contains("storage directory"));
    }

    #[tokio::test]
    async fn analyze_queued_acknowledges_without_result() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("uploads");
        let app = test_app(Arc::new(FailingAnalyzer), root.clone(), AnalyzeMode::Queued);

        let body = multipart_body(Some("Summarize risk"), Some(("sample.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "processing");
        assert_eq!(json["file_processed"], "sample.pdf");
        assert!(json.get("analysis").is_none());

        // The background task must still clean up the stored document.
        for _ in 0..50 {
            if stored_files(&root).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("queued task never cleaned up the stored document");
    }

    #[tokio::test]
    async fn analyze_queued_persistence_failure_returns_500() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"file in the way").unwrap();

        let app = test_app(Arc::new(PeekingAnalyzer), blocked, AnalyzeMode::Queued);

        let body = multipart_body(None, Some(("sample.pdf", b"%PDF-1.4")));
        let response = app.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert!(json["detail"]
            .as_str()
            .unwrap()
            .starts_with("Error starting analysis:"));
    }

    #[tokio::test]
    async fn concurrent_uploads_do_not_collide() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("uploads");
        let app = test_app(Arc::new(PeekingAnalyzer), root.clone(), AnalyzeMode::Sync);

        let mut handles = Vec::new();
        for i in 0..8 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                let content = format!("%PDF-1.4 {}", "x".repeat(i + 1));
                let body = multipart_body(None, Some(("sample.pdf", content.as_bytes())));
                let response = app.oneshot(analyze_request(body)).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                let json = json_body(response).await;
                // Each request analyzed its own payload, not another's.
                assert_eq!(
                    json["analysis"],
                    format!("analyzed {} bytes for query: {}", content.len(), DEFAULT_QUERY)
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(stored_files(&root).is_empty());
    }
}
