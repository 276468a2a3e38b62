//! `HttpBackend` against a local document service.
//!
//! The service is a small axum app bound to an ephemeral port, speaking the
//! same endpoints as the real backend: multipart upload, document info,
//! static uploads and the query endpoint.

use async_trait::async_trait;
use axum::extract::{Multipart, Path};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use edgequake_pdfchat::{
    CitationSource, ContentLoadState, DocumentId, DocumentStore, HttpBackend, PageRenderer,
    PdfFile, QueryService, RenderedPage, SessionConfig, SessionController, SessionError, Services,
    Uploader,
};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use std::sync::Arc;

const PDF: &[u8] = b"%PDF-1.7\n1 0 obj << >> endobj\n%%EOF\n";

// ── Local document service ───────────────────────────────────────────────

async fn upload(mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("pdf") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown.pdf").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let Ok(data) = field.bytes().await else {
            break;
        };
        if filename == "rejected.pdf" || content_type != "application/pdf" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Only PDF files are allowed" })),
            )
                .into_response();
        }
        return Json(json!({
            "documentId": "d1",
            "filename": filename,
            "pageCount": data.len() % 7 + 1,
        }))
        .into_response();
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "No file uploaded" })),
    )
        .into_response()
}

async fn document_info(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "d1" => Json(json!({ "filepath": "/uploads/d1.pdf" })).into_response(),
        "big" => Json(json!({ "filepath": "/uploads/big.pdf" })).into_response(),
        "broken-link" => Json(json!({ "filepath": "/uploads/gone.pdf" })).into_response(),
        "odd id" => Json(json!({ "filepath": "/uploads/d1.pdf" })).into_response(),
        "stuck" => {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Json(json!({ "filepath": "/uploads/d1.pdf" })).into_response()
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        )
            .into_response(),
    }
}

async fn uploaded_file(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "d1.pdf" => ([(header::CONTENT_TYPE, "application/pdf")], PDF).into_response(),
        "big.pdf" => (
            [(header::CONTENT_TYPE, "application/pdf")],
            vec![b'%'; 64 * 1024],
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn query(Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let question = body["question"].as_str().unwrap_or_default();
    if question == "fail" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "index not ready" })),
        )
            .into_response();
    }
    Json(json!({
        "answer": format!("{id}: you asked {question:?}. See [Page 2]."),
        "citations": [{ "pages": [3, 4] }, { "pages": [] }],
    }))
    .into_response()
}

async fn spawn_service() -> String {
    let app = Router::new()
        .route("/api/documents/upload", post(upload))
        .route("/api/documents/{id}", get(document_info))
        .route("/api/documents/{id}/query", post(query))
        .route("/uploads/{name}", get(uploaded_file));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(base_url: &str) -> HttpBackend {
    let config = SessionConfig::builder().base_url(base_url).build().unwrap();
    HttpBackend::new(&config).unwrap()
}

fn id(raw: &str) -> DocumentId {
    DocumentId::new(raw).unwrap()
}

// ── Upload ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_returns_receipt() {
    let base = spawn_service().await;
    let file = PdfFile::from_bytes("paper.pdf", PDF, FsPath::new("paper.pdf")).unwrap();

    let receipt = backend(&base).upload(file).await.unwrap();
    assert_eq!(receipt.document_id, "d1");
    assert_eq!(receipt.filename, "paper.pdf");
    assert!(receipt.page_count >= 1);
}

#[tokio::test]
async fn upload_rejection_carries_server_message() {
    let base = spawn_service().await;
    let file = PdfFile::from_bytes("rejected.pdf", PDF, FsPath::new("rejected.pdf")).unwrap();

    match backend(&base).upload(file).await.unwrap_err() {
        SessionError::UploadFailed { reason } => assert_eq!(reason, "Only PDF files are allowed"),
        other => panic!("expected UploadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_to_separate_endpoint() {
    let base = spawn_service().await;
    let config = SessionConfig::builder()
        .base_url("http://127.0.0.1:9")
        .upload_url(format!("{base}/api/documents/upload"))
        .build()
        .unwrap();
    let file = PdfFile::from_bytes("x.pdf", PDF, FsPath::new("x.pdf")).unwrap();

    let receipt = HttpBackend::new(&config).unwrap().upload(file).await.unwrap();
    assert_eq!(receipt.document_id, "d1");
}

// ── Content ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolves_locator_and_fetches_bytes() {
    let base = spawn_service().await;
    let b = backend(&base);

    let locator = b.resolve_locator(&id("d1")).await.unwrap();
    assert_eq!(locator.0, format!("{base}/uploads/d1.pdf"));

    let bytes = b.fetch_content(&locator).await.unwrap();
    assert_eq!(bytes.as_ref(), PDF);
}

#[tokio::test]
async fn document_ids_are_path_encoded() {
    let base = spawn_service().await;
    let locator = backend(&base).resolve_locator(&id("odd id")).await.unwrap();
    assert!(locator.0.ends_with("/uploads/d1.pdf"));
}

#[tokio::test]
async fn unknown_document_is_a_locator_error() {
    let base = spawn_service().await;
    let err = backend(&base).resolve_locator(&id("nope")).await.unwrap_err();
    assert!(matches!(err, SessionError::LocatorResolution { .. }), "got {err:?}");
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn hung_document_lookup_times_out() {
    let base = spawn_service().await;
    let config = SessionConfig::builder()
        .base_url(&base)
        .content_timeout(std::time::Duration::from_millis(200))
        .build()
        .unwrap();

    let err = HttpBackend::new(&config)
        .unwrap()
        .resolve_locator(&id("stuck"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LocatorResolution { .. }), "got {err:?}");
    assert!(err.to_string().contains("timed out"), "got {err}");
}

#[tokio::test]
async fn missing_file_is_a_transfer_error() {
    let base = spawn_service().await;
    let b = backend(&base);
    let locator = b.resolve_locator(&id("broken-link")).await.unwrap();
    let err = b.fetch_content(&locator).await.unwrap_err();
    assert!(matches!(err, SessionError::ContentTransfer { .. }), "got {err:?}");
}

#[tokio::test]
async fn oversized_payload_is_refused() {
    let base = spawn_service().await;
    let config = SessionConfig::builder()
        .base_url(&base)
        .max_content_bytes(1024)
        .build()
        .unwrap();
    let b = HttpBackend::new(&config).unwrap();

    let locator = b.resolve_locator(&id("big")).await.unwrap();
    let err = b.fetch_content(&locator).await.unwrap_err();
    assert!(err.to_string().contains("1024 byte limit"), "got {err}");
}

// ── Query ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_returns_answer_with_citations() {
    let base = spawn_service().await;
    let answer = backend(&base).ask(&id("d1"), "what is this?").await.unwrap();

    assert_eq!(answer.text, "d1: you asked \"what is this?\". See [Page 2].");
    assert_eq!(answer.citations.len(), 1, "empty page list dropped");
    assert_eq!(answer.citations[0].page_numbers(), &[3, 4]);
}

#[tokio::test]
async fn query_service_error_keeps_status_and_message() {
    let base = spawn_service().await;
    match backend(&base).ask(&id("d1"), "fail").await.unwrap_err() {
        SessionError::QueryService { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "index not ready");
        }
        other => panic!("expected QueryService, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // port 9 (discard) is not listening on loopback in test environments
    let err = backend("http://127.0.0.1:9")
        .ask(&id("d1"), "hello")
        .await
        .unwrap_err();
    assert!(err.is_query_error());
    assert!(matches!(err, SessionError::QueryTransport { .. }), "got {err:?}");
}

// ── Whole session over HTTP ──────────────────────────────────────────────

struct CountingRenderer;

#[async_trait]
impl PageRenderer for CountingRenderer {
    async fn page_count(&self, content: Bytes) -> Result<u32, SessionError> {
        Ok(if content.starts_with(b"%PDF") { 4 } else { 1 })
    }

    async fn render_page(&self, _content: Bytes, page: u32) -> Result<RenderedPage, SessionError> {
        Err(SessionError::Render {
            detail: format!("page {page} not rendered in tests"),
        })
    }
}

#[tokio::test]
async fn session_over_http() {
    let base = spawn_service().await;
    let config = SessionConfig::builder().base_url(&base).build().unwrap();
    let http = Arc::new(HttpBackend::new(&config).unwrap());

    let file = PdfFile::from_bytes("paper.pdf", PDF, FsPath::new("paper.pdf")).unwrap();
    let receipt = http.upload(file).await.unwrap();

    let services = Services {
        store: http.clone(),
        query: http.clone(),
        renderer: Arc::new(CountingRenderer),
    };
    let mut session = SessionController::new(config, services);
    session.on_upload_complete(receipt).unwrap();
    session.settle().await;

    assert!(matches!(session.content_state(), ContentLoadState::Ready(_)));
    assert_eq!(session.pagination().total(), 4);

    assert!(session.submit("summary?"));
    session.settle().await;

    let answer = session.messages().last().unwrap();
    let id = answer.id;
    assert!(answer.text.ends_with("See [Page 2]."));
    assert_eq!(session.activate_citation(id, CitationSource::Inline, 0), Some(2));
    assert_eq!(session.activate_citation(id, CitationSource::Structured, 0), Some(3));
}
