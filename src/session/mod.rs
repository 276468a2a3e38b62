//! Document session state.
//!
//! Each submodule owns one piece of state; [`controller`] composes them.
//!
//! ## Data Flow
//!
//! ```text
//! upload receipt ──▶ controller ──▶ content ──▶ page renderer
//!                        │           (bytes)     (page count)
//!                        │                            │
//!                        ▼                            ▼
//!                   conversation ──▶ citation ──▶ pagination
//!                   (questions)      ([Page N])   (current page)
//! ```
//!
//! 1. [`document`]: document identity from the upload receipt
//! 2. [`content`]: two-step content fetch, last request wins
//! 3. [`pagination`]: clamped current page against a correctable total
//! 4. [`conversation`]: message log with in-place pending replacement
//! 5. [`citation`]: `[Page N]` extraction and text segmentation
//! 6. [`controller`]: the state machine wiring everything together

pub mod citation;
pub mod content;
pub mod controller;
pub mod conversation;
pub mod document;
pub mod pagination;

pub use citation::{extract, segment, CitationRef, Segment};
pub use content::{ContentLoadState, ContentLoader, LoadTicket};
pub use controller::{ContentSummary, SessionController, SessionEvent, SessionPhase, SessionSnapshot};
pub use conversation::{
    Author, CitationSource, ConversationLog, Message, MessageId, MessageStatus, QueryTicket,
    APOLOGY_TEXT, NO_ANSWER_TEXT, PENDING_TEXT,
};
pub use document::{Document, DocumentId, UploadReceipt};
pub use pagination::Pagination;
