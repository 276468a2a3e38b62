//! External collaborators of a document session.
//!
//! The session core never talks to the network or to a PDF engine
//! directly. Everything it needs from the outside world goes through the
//! four traits below, which keeps the state machine testable with
//! in-memory fakes and lets hosts swap transports.
//!
//! ```text
//!             ┌────────────────┐  resolve_locator / fetch_content
//!             │ DocumentStore  │◀──────────────────────────── content loader
//!             ├────────────────┤  ask
//!             │ QueryService   │◀──────────────────────────── conversation
//!             ├────────────────┤  page_count / render_page
//!             │ PageRenderer   │◀──────────────────────────── controller / viewer
//!             ├────────────────┤  upload
//!             │ Uploader       │◀──────────────────────────── host (before a session)
//!             └────────────────┘
//! ```
//!
//! [`http::HttpBackend`] implements the first, second and fourth over HTTP;
//! [`render::PdfiumRenderer`] implements the third with pdfium.

pub mod http;
pub mod pdf_file;
pub mod render;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::{CitationRef, DocumentId, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

pub use http::HttpBackend;
pub use pdf_file::PdfFile;
pub use render::{PdfiumRenderer, RenderedPage};

/// Where a document's binary content can be fetched from (path or URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLocator(pub String);

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query service answer, already normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    /// Answer text; may be empty (the conversation substitutes a fallback).
    pub text: String,
    /// Structured citations supplied alongside the text.
    pub citations: Vec<CitationRef>,
}

impl Answer {
    pub fn new(text: impl Into<String>, citations: Vec<CitationRef>) -> Self {
        Self {
            text: text.into(),
            citations,
        }
    }
}

/// Maps a document id to its content and fetches the bytes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve where the document's content lives.
    async fn resolve_locator(&self, document_id: &DocumentId)
        -> Result<ContentLocator, SessionError>;

    /// Download the binary payload behind a locator.
    async fn fetch_content(&self, locator: &ContentLocator) -> Result<Bytes, SessionError>;
}

/// Answers questions about an uploaded document.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn ask(&self, document_id: &DocumentId, question: &str) -> Result<Answer, SessionError>;
}

/// Turns PDF bytes into page counts and page images.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Authoritative number of pages in the payload.
    async fn page_count(&self, content: Bytes) -> Result<u32, SessionError>;

    /// Render one 1-indexed page.
    async fn render_page(&self, content: Bytes, page: u32) -> Result<RenderedPage, SessionError>;
}

/// Sends a local PDF to the document service.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: PdfFile) -> Result<UploadReceipt, SessionError>;
}

/// The collaborators a [`crate::SessionController`] needs.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub query: Arc<dyn QueryService>,
    pub renderer: Arc<dyn PageRenderer>,
}

impl Services {
    /// HTTP backend for store and query, pdfium for rendering.
    ///
    /// The pdfium library is only bound when a page is actually counted or
    /// rendered, so building the services never fails because of it.
    pub fn http(config: &SessionConfig) -> Result<Self, SessionError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        Ok(Self {
            store: backend.clone(),
            query: backend,
            renderer: Arc::new(PdfiumRenderer::from_env(config.render_max_pixels)),
        })
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("store", &"<dyn DocumentStore>")
            .field("query", &"<dyn QueryService>")
            .field("renderer", &"<dyn PageRenderer>")
            .finish()
    }
}
