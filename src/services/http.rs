//! HTTP backend for the document service.
//!
//! ## Endpoints
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | upload | `POST {upload_url}` multipart field `pdf` | `{"documentId","filename","pageCount"}` |
//! | locator | `GET {base}/api/documents/{id}` | `{"filepath": "/uploads/…"}` |
//! | content | `GET {base}{filepath}` | PDF bytes |
//! | query | `POST {base}/api/documents/{id}/query` `{"question"}` | `{"answer","citations":[{"pages":[…]}]}` |
//!
//! Error responses may carry `{"error": "…"}`; that message is surfaced in
//! upload and query-service errors when present.
//!
//! ## Why stream the content body?
//!
//! PDFs can be large. Streaming the body lets us stop as soon as it crosses
//! `max_content_bytes` instead of buffering an arbitrarily large response
//! before finding out it is too big.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::services::{Answer, ContentLocator, DocumentStore, PdfFile, QueryService, Uploader};
use crate::session::citation::WireCitation;
use crate::session::{DocumentId, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Talks to the document service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    upload_url: String,
    lookup_timeout: Duration,
    upload_timeout_secs: u64,
    query_timeout_secs: Option<u64>,
    max_content_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct DocumentInfo {
    filepath: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct WireAnswer {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    citations: Option<Vec<WireCitation>>,
}

impl From<WireAnswer> for Answer {
    fn from(w: WireAnswer) -> Self {
        Answer {
            text: w.answer.unwrap_or_default(),
            citations: w
                .citations
                .unwrap_or_default()
                .iter()
                .filter_map(WireCitation::to_citation)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SessionError::InvalidConfig(format!("invalid base URL '{}': {e}", config.base_url))
        })?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SessionError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            upload_url: config.upload_endpoint(),
            lookup_timeout: config.content_timeout,
            upload_timeout_secs: config.upload_timeout_secs,
            query_timeout_secs: config.query_timeout_secs,
            max_content_bytes: config.max_content_bytes,
        })
    }

    /// `{base}/seg/seg/…` with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn the service's `filepath` into a fetchable URL.
    fn locator_for(&self, filepath: &str) -> ContentLocator {
        if filepath.starts_with("http://") || filepath.starts_with("https://") {
            return ContentLocator(filepath.to_string());
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = filepath.trim_start_matches('/');
        ContentLocator(format!("{base}/{path}"))
    }
}

#[async_trait]
impl DocumentStore for HttpBackend {
    async fn resolve_locator(
        &self,
        document_id: &DocumentId,
    ) -> Result<ContentLocator, SessionError> {
        let fail = |reason: String| SessionError::LocatorResolution {
            document_id: document_id.to_string(),
            reason,
        };

        let url = self
            .api_url(&["api", "documents", document_id.as_str()])
            .map_err(fail)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.lookup_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(format!("timed out after {:?}", self.lookup_timeout))
                } else {
                    fail(e.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let info: DocumentInfo = response
            .json()
            .await
            .map_err(|e| fail(format!("unreadable document info: {e}")))?;
        Ok(self.locator_for(&info.filepath))
    }

    async fn fetch_content(&self, locator: &ContentLocator) -> Result<Bytes, SessionError> {
        let fail = |reason: String| SessionError::ContentTransfer {
            locator: locator.0.clone(),
            reason,
        };

        let response = self
            .client
            .get(locator.0.as_str())
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_content_bytes {
                return Err(fail(format!(
                    "payload of {len} bytes exceeds the {} byte limit",
                    self.max_content_bytes
                )));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fail(e.to_string()))?;
            if (body.len() + chunk.len()) as u64 > self.max_content_bytes {
                return Err(fail(format!(
                    "payload exceeds the {} byte limit",
                    self.max_content_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        info!("Downloaded {} bytes from {}", body.len(), locator);
        Ok(Bytes::from(body))
    }
}

#[async_trait]
impl QueryService for HttpBackend {
    async fn ask(&self, document_id: &DocumentId, question: &str) -> Result<Answer, SessionError> {
        let transport = |reason: String| SessionError::QueryTransport { reason };

        let url = self
            .api_url(&["api", "documents", document_id.as_str(), "query"])
            .map_err(transport)?;
        debug!("POST {}", url);

        let mut request = self.client.post(url).json(&QueryRequest { question });
        if let Some(secs) = self.query_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                transport(format!("timed out: {e}"))
            } else {
                transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::QueryService {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let wire: WireAnswer = response
            .json()
            .await
            .map_err(|e| transport(format!("unreadable answer: {e}")))?;
        Ok(Answer::from(wire))
    }
}

#[async_trait]
impl Uploader for HttpBackend {
    async fn upload(&self, file: PdfFile) -> Result<UploadReceipt, SessionError> {
        info!(
            "Uploading {} ({:.2} MB) to {}",
            file.filename,
            file.size_mb(),
            self.upload_url
        );

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")
            .map_err(|e| SessionError::UploadFailed {
                reason: e.to_string(),
            })?;
        let form = Form::new().part("pdf", part);

        let response = self
            .client
            .post(self.upload_url.as_str())
            .multipart(form)
            .timeout(Duration::from_secs(self.upload_timeout_secs))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SessionError::UploadTimeout {
                        secs: self.upload_timeout_secs,
                    }
                } else {
                    SessionError::UploadFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(SessionError::UploadFailed {
                reason: error_message(response).await,
            });
        }

        let receipt: UploadReceipt =
            response
                .json()
                .await
                .map_err(|e| SessionError::UploadFailed {
                    reason: format!("unreadable upload response: {e}"),
                })?;
        info!("Upload success: document {}", receipt.document_id);
        Ok(receipt)
    }
}

/// Best-effort message from an error response: `error`, then `message`,
/// then the raw body, then the status line.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { error: Some(e), .. }) => e,
        Ok(ErrorBody {
            message: Some(m), ..
        }) => m,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("HTTP {status}"),
    }
}
