//! The session controller: one document, its pages, one conversation.
//!
//! ## Phases
//!
//! ```text
//! NoDocument ──upload──▶ DocumentLoading ──content Ready/Failed──▶ DocumentReady
//! ```
//!
//! A load failure still moves the controller to `DocumentReady`; the failure
//! stays visible through [`ContentLoadState::Failed`] so the viewer can show
//! which document broke. There is no way back to `NoDocument`: a new upload
//! means a new controller.
//!
//! ## Event model
//!
//! All state lives in this struct and is only mutated through `&mut self`
//! methods. Network work (content fetch, page counting, questions) runs in
//! spawned tasks that never touch session state; they send a
//! [`SessionEvent`] back over a channel instead, and the host applies it by
//! calling [`SessionController::process_next`] (or
//! [`SessionController::settle`]). Every event carries the ticket of the
//! request that produced it and is dropped if that request has since been
//! superseded.
//!
//! Methods that start work call `tokio::spawn` and so must run inside a
//! Tokio runtime.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::observer::{NoopObserver, SharedObserver};
use crate::services::{Answer, RenderedPage, Services};
use crate::session::content::{self, ContentLoadState, ContentLoader, LoadTicket};
use crate::session::conversation::{CitationSource, ConversationLog, Message, MessageId, QueryTicket};
use crate::session::{Document, Pagination, UploadReceipt};
use bytes::Bytes;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NoDocument,
    DocumentLoading,
    DocumentReady,
}

/// Completion of a background request, applied by the controller.
#[derive(Debug)]
pub enum SessionEvent {
    ContentFetched {
        ticket: LoadTicket,
        outcome: Result<Bytes, SessionError>,
    },
    PageCountDiscovered {
        ticket: LoadTicket,
        outcome: Result<u32, SessionError>,
    },
    AnswerReceived {
        ticket: QueryTicket,
        outcome: Result<Answer, SessionError>,
    },
}

/// Serialisable view of the whole session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub document: Option<Document>,
    pub content: ContentSummary,
    pub pagination: Pagination,
    pub render_error: Option<String>,
    pub awaiting_answer: bool,
    pub messages: Vec<Message>,
}

/// [`ContentLoadState`] without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContentSummary {
    Idle,
    Loading,
    Ready { bytes: usize },
    Failed { message: String },
}

impl From<&ContentLoadState> for ContentSummary {
    fn from(state: &ContentLoadState) -> Self {
        match state {
            ContentLoadState::Idle => ContentSummary::Idle,
            ContentLoadState::Loading => ContentSummary::Loading,
            ContentLoadState::Ready(b) => ContentSummary::Ready { bytes: b.len() },
            ContentLoadState::Failed(m) => ContentSummary::Failed { message: m.clone() },
        }
    }
}

pub struct SessionController {
    config: SessionConfig,
    services: Services,
    observer: SharedObserver,

    phase: SessionPhase,
    document: Option<Document>,
    pagination: Pagination,
    content: ContentLoader,
    conversation: ConversationLog,
    render_error: Option<String>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    in_flight: usize,
}

impl SessionController {
    pub fn new(config: SessionConfig, services: Services) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let observer = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver));
        Self {
            config,
            services,
            observer,
            phase: SessionPhase::NoDocument,
            document: None,
            pagination: Pagination::default(),
            content: ContentLoader::new(),
            conversation: ConversationLog::new(),
            render_error: None,
            events_tx,
            events_rx,
            in_flight: 0,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn content_state(&self) -> &ContentLoadState {
        self.content.state()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn render_error(&self) -> Option<&str> {
        self.render_error.as_deref()
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.conversation.is_pending()
    }

    /// Number of background requests whose events have not been processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            document: self.document.clone(),
            content: ContentSummary::from(self.content.state()),
            pagination: self.pagination,
            render_error: self.render_error.clone(),
            awaiting_answer: self.conversation.is_pending(),
            messages: self.conversation.messages().to_vec(),
        }
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// Upload finished: adopt the document and start loading its content.
    pub fn on_upload_complete(&mut self, receipt: UploadReceipt) -> Result<(), SessionError> {
        if let Some(current) = &self.document {
            return Err(SessionError::DocumentAlreadyOpen {
                document_id: current.id.to_string(),
            });
        }
        let document = Document::try_from(receipt)?;
        info!(
            "Opening document {} ({}, {} pages declared)",
            document.id, document.filename, document.declared_page_count
        );

        self.pagination = Pagination::new(document.declared_page_count);
        self.conversation = if self.config.greeting {
            ConversationLog::with_greeting(document.display_name())
        } else {
            ConversationLog::new()
        };
        for message in self.conversation.messages() {
            self.observer.on_message_appended(message);
        }
        self.document = Some(document);

        self.set_phase(SessionPhase::DocumentLoading);
        self.observer.on_page_change(self.pagination);
        self.start_content_load();
        Ok(())
    }

    /// Restart the content load for the open document (manual retry).
    ///
    /// The phase is left as is; any response still in flight for the
    /// previous attempt is discarded when it arrives. Returns `false` when
    /// there is no document.
    pub fn reload(&mut self) -> bool {
        if self.document.is_none() {
            return false;
        }
        info!("Reloading document content");
        self.start_content_load();
        true
    }

    /// Ask a question about the open document. Fire-and-forget.
    ///
    /// Returns `false` when the question was ignored: no document yet, blank
    /// text, or an earlier answer still pending.
    pub fn submit(&mut self, question: &str) -> bool {
        let Some(document_id) = self.document.as_ref().map(|d| d.id.clone()) else {
            debug!("Ignoring question: no document");
            return false;
        };
        let Some(dispatch) = self.conversation.begin(question) else {
            return false;
        };

        for id in [dispatch.user_message, dispatch.pending_message] {
            if let Some(message) = self.conversation.message(id) {
                self.observer.on_message_appended(message);
            }
        }

        debug!("Dispatching question for {}", document_id);
        let query = Arc::clone(&self.services.query);
        let tx = self.events_tx.clone();
        let ticket = dispatch.ticket;
        self.in_flight += 1;
        spawn_reporting(
            tx,
            "query",
            async move { query.ask(&document_id, &dispatch.question).await },
            move |outcome| SessionEvent::AnswerReceived { ticket, outcome },
        );
        true
    }

    /// A citation was activated: go to its page (clamped).
    pub fn on_citation_click(&mut self, page: i64) -> u32 {
        self.go_to_page(page)
    }

    /// Viewer controls asked for a page (clamped).
    pub fn on_page_change(&mut self, page: i64) -> u32 {
        self.go_to_page(page)
    }

    pub fn next_page(&mut self) -> u32 {
        self.go_to_page(i64::from(self.pagination.current()) + 1)
    }

    pub fn previous_page(&mut self) -> u32 {
        self.go_to_page(i64::from(self.pagination.current()) - 1)
    }

    /// Activate the `index`-th citation of `source` in message `id`.
    ///
    /// Returns the page navigated to, or `None` if there is no such citation.
    pub fn activate_citation(
        &mut self,
        id: MessageId,
        source: CitationSource,
        index: usize,
    ) -> Option<u32> {
        let page = self
            .conversation
            .message(id)?
            .citation(source, index)?
            .first_page();
        Some(self.on_citation_click(i64::from(page)))
    }

    /// The renderer reported the real page count; it replaces the declared one.
    pub fn on_page_count_discovered(&mut self, total: u32) {
        if total != self.pagination.total() {
            info!(
                "Page count corrected: {} -> {}",
                self.pagination.total(),
                total
            );
        }
        self.pagination.set_total(total);
        self.observer.on_page_change(self.pagination);
    }

    /// Render the current page of the loaded content.
    pub async fn render_current_page(&self) -> Result<RenderedPage, SessionError> {
        let content = self.content.state().content().cloned().ok_or_else(|| {
            SessionError::Render {
                detail: "document content is not loaded".into(),
            }
        })?;
        self.services
            .renderer
            .render_page(content, self.pagination.current())
            .await
    }

    // ── Event processing ─────────────────────────────────────────────────

    /// Wait for the next completion event and apply it.
    ///
    /// Returns `false` immediately when nothing is in flight.
    pub async fn process_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.in_flight -= 1;
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply every event that is already available without waiting.
    pub fn drain_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Process events until no request is left in flight.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ContentFetched { ticket, outcome } => {
                if !self.content.complete(ticket, outcome) {
                    return;
                }
                self.observer.on_content_state(self.content.state());
                if self.phase == SessionPhase::DocumentLoading {
                    self.set_phase(SessionPhase::DocumentReady);
                }
                if let Some(bytes) = self.content.state().content().cloned() {
                    self.start_page_count(ticket, bytes);
                }
            }
            SessionEvent::PageCountDiscovered { ticket, outcome } => {
                if !self.content.is_current(ticket) {
                    debug!("Ignoring page count for superseded load {:?}", ticket);
                    return;
                }
                match outcome {
                    Ok(total) => self.on_page_count_discovered(total),
                    Err(e) => {
                        warn!("Render error: {}", e);
                        let message = e.to_string();
                        self.observer.on_render_error(&message);
                        self.render_error = Some(message);
                    }
                }
            }
            SessionEvent::AnswerReceived { ticket, outcome } => {
                if let Some(message) = self.conversation.resolve(ticket, outcome) {
                    self.observer.on_message_resolved(message);
                }
            }
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn go_to_page(&mut self, page: i64) -> u32 {
        let before = self.pagination.current();
        let now = self.pagination.go_to(page);
        if now != before {
            self.observer.on_page_change(self.pagination);
        }
        now
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.observer.on_phase_change(phase);
    }

    fn start_content_load(&mut self) {
        let Some(document_id) = self.document.as_ref().map(|d| d.id.clone()) else {
            return;
        };
        self.render_error = None;
        let ticket = self.content.begin(&document_id);
        self.observer.on_content_state(self.content.state());

        let store = Arc::clone(&self.services.store);
        let timeout = self.config.content_timeout;
        let tx = self.events_tx.clone();
        self.in_flight += 1;
        spawn_reporting(
            tx,
            "content fetch",
            async move { content::fetch(store.as_ref(), &document_id, timeout).await },
            move |outcome| SessionEvent::ContentFetched { ticket, outcome },
        );
    }

    fn start_page_count(&mut self, ticket: LoadTicket, bytes: Bytes) {
        let renderer = Arc::clone(&self.services.renderer);
        let tx = self.events_tx.clone();
        self.in_flight += 1;
        spawn_reporting(
            tx,
            "page count",
            async move { renderer.page_count(bytes).await },
            move |outcome| SessionEvent::PageCountDiscovered { ticket, outcome },
        );
    }
}

/// Run `work` on its own task and always report back exactly one event.
///
/// A panicking or aborted task becomes `SessionError::Internal`, so every
/// request counted in `in_flight` is answered.
fn spawn_reporting<T, F, W>(
    tx: mpsc::UnboundedSender<SessionEvent>,
    task: &'static str,
    work: F,
    wrap: W,
) where
    T: Send + 'static,
    F: Future<Output = Result<T, SessionError>> + Send + 'static,
    W: FnOnce(Result<T, SessionError>) -> SessionEvent + Send + 'static,
{
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        let outcome = handle.await.unwrap_or_else(|e| {
            warn!("{} task failed: {}", task, e);
            Err(SessionError::Internal(format!("{task} task failed: {e}")))
        });
        let _ = tx.send(wrap(outcome));
    });
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("phase", &self.phase)
            .field("document", &self.document)
            .field("content", &ContentSummary::from(self.content.state()))
            .field("pagination", &self.pagination)
            .field("messages", &self.conversation.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
