//! # edgequake-pdfchat
//!
//! Chat with an uploaded PDF: one document, its pages, one conversation.
//!
//! ## Why this crate?
//!
//! A "chat with your PDF" client looks simple but has three pieces of state
//! that must stay consistent while network responses arrive in any order:
//! the document's content, the page the viewer shows, and the conversation
//! whose answers cite pages (`"It is about X [Page 2]."`). This crate owns
//! that state in a single [`SessionController`] with a small set of entry
//! points, and leaves drawing to the host.
//!
//! ## Session Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Adopt    document id / filename / declared page count
//!  ├─ 2. Load     resolve locator → fetch bytes (bounded wait, last request wins)
//!  ├─ 3. Count    pdfium page count corrects the declared total
//!  ├─ 4. Ask      user message + pending placeholder → answer replaces it in place
//!  ├─ 5. Cite     `[Page N]` markers and structured citations become buttons
//!  └─ 6. Navigate citation click / prev / next → clamped current page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfchat::{PdfFile, SessionConfig, SessionController, Services, HttpBackend, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::builder().base_url("http://localhost:5001").build()?;
//!     let backend = HttpBackend::new(&config)?;
//!     let receipt = backend.upload(PdfFile::read("paper.pdf").await?).await?;
//!
//!     let mut session = SessionController::new(config.clone(), Services::http(&config)?);
//!     session.on_upload_complete(receipt)?;
//!     session.settle().await;
//!
//!     session.submit("What is this paper about?");
//!     session.settle().await;
//!     for message in session.messages() {
//!         println!("{:?}: {}", message.author, message.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdfchat = { version = "0.1", default-features = false }
//! ```
//!
//! ## Rendering
//!
//! Page counting and rasterisation use a pdfium shared library bound at
//! runtime. Point `PDFIUM_LIB_PATH` at it, or install it where the system
//! loader finds it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod services;
pub mod session;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::SessionError;
pub use observer::{NoopObserver, SessionObserver, SharedObserver};
pub use services::{
    Answer, ContentLocator, DocumentStore, HttpBackend, PageRenderer, PdfFile, PdfiumRenderer,
    QueryService, RenderedPage, Services, Uploader,
};
pub use session::{
    Author, CitationRef, CitationSource, ContentLoadState, Document, DocumentId, Message,
    MessageId, MessageStatus, Pagination, Segment, SessionController, SessionEvent, SessionPhase,
    SessionSnapshot, UploadReceipt,
};
