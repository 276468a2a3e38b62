//! Observer trait for session state changes.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::SessionConfigBuilder::observer`] to be told about every
//! mutation the [`crate::SessionController`] applies: phase changes,
//! content-load transitions, page moves and conversation updates.
//!
//! # Why callbacks instead of channels?
//!
//! A rendering layer is a projection of session state; all it needs is a
//! nudge that something changed plus the new value. A callback lets hosts
//! forward that nudge anywhere (a redraw flag, a WebSocket, a terminal
//! spinner) without the library knowing how the host draws.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfchat::{SessionConfig, SessionObserver, Pagination};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PageTracker {
//!     page: AtomicU32,
//! }
//!
//! impl SessionObserver for PageTracker {
//!     fn on_page_change(&self, pagination: Pagination) {
//!         self.page.store(pagination.current(), Ordering::SeqCst);
//!     }
//! }
//!
//! let tracker = Arc::new(PageTracker { page: AtomicU32::new(1) });
//! let config = SessionConfig::builder()
//!     .observer(tracker as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::session::{ContentLoadState, Message, Pagination, SessionPhase};
use std::sync::Arc;

/// Called by the session controller after each state mutation.
///
/// All methods default to no-ops so implementations override only what
/// they care about. Callbacks run synchronously inside the controller's
/// `&mut self` methods and must not block.
pub trait SessionObserver: Send + Sync {
    /// The controller moved to a new phase.
    fn on_phase_change(&self, phase: SessionPhase) {
        let _ = phase;
    }

    /// Content loading started, finished or failed.
    fn on_content_state(&self, state: &ContentLoadState) {
        let _ = state;
    }

    /// Current page or page total changed.
    fn on_page_change(&self, pagination: Pagination) {
        let _ = pagination;
    }

    /// A message was appended (user question, pending placeholder).
    fn on_message_appended(&self, message: &Message) {
        let _ = message;
    }

    /// A pending message was replaced by its final or errored version.
    fn on_message_resolved(&self, message: &Message) {
        let _ = message;
    }

    /// The page renderer could not parse the loaded payload.
    fn on_render_error(&self, error: &str) {
        let _ = error;
    }
}

/// Used when no observer is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type SharedObserver = Arc<dyn SessionObserver>;
