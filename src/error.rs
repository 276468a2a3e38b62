//! Error types for the edgequake-pdfchat library.
//!
//! Every failure in a document session has exactly one [`SessionError`]
//! variant, grouped by where it originates:
//!
//! * **Usage / config**: caller mistakes caught before any I/O starts.
//! * **Upload**: returned as `Err` to the caller; the session core never
//!   models upload failure as a state (the host shows an alert instead).
//! * **Content / render / query**: caught where they happen and folded into
//!   a terminal display value: [`crate::session::ContentLoadState::Failed`],
//!   the controller's `render_error`, or an errored assistant message.
//!   They travel as `SessionError` only inside completion events.
//!
//! Nothing in this crate retries automatically. Retrying is always a user
//! action (ask the question again, reload the document).

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the edgequake-pdfchat library.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Usage / config errors ─────────────────────────────────────────────
    /// A document identifier was empty.
    #[error("Document identifier must not be empty")]
    EmptyDocumentId,

    /// The session already has a document; a new upload needs a new session.
    #[error("Session already has document '{document_id}' open; start a new session to replace it")]
    DocumentAlreadyOpen { document_id: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upload errors ─────────────────────────────────────────────────────
    /// Local file to upload was not found.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Upload request failed or the server rejected the file.
    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    /// Upload exceeded the configured timeout.
    #[error("Upload timed out after {secs}s\nIncrease --upload-timeout.")]
    UploadTimeout { secs: u64 },

    // ── Content errors ────────────────────────────────────────────────────
    /// The document store could not map the id to a content locator.
    #[error("Could not resolve content location for document '{document_id}': {reason}")]
    LocatorResolution { document_id: String, reason: String },

    /// Content locator was resolved but the transfer failed.
    #[error("Failed to download '{locator}': {reason}")]
    ContentTransfer { locator: String, reason: String },

    /// Content transfer exceeded the bounded wait.
    #[error("timeout of {elapsed_ms}ms exceeded while downloading '{locator}'")]
    ContentTimeout { locator: String, elapsed_ms: u64 },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Payload was retrieved but cannot be parsed or rendered as a PDF.
    #[error("Failed to render PDF: {detail}")]
    Render { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Query errors ──────────────────────────────────────────────────────
    /// Query never reached the service, or the response was unreadable.
    #[error("Query transport error: {reason}")]
    QueryTransport { reason: String },

    /// Query service answered with a non-success status.
    #[error("Query service returned HTTP {status}: {message}")]
    QueryService { status: u16, message: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// `true` for failures of the content-loading path (locator or transfer).
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            SessionError::LocatorResolution { .. }
                | SessionError::ContentTransfer { .. }
                | SessionError::ContentTimeout { .. }
        )
    }

    /// `true` for failures of the question/answer path.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            SessionError::QueryTransport { .. } | SessionError::QueryService { .. }
        )
    }
}
