//! Content loading: fetch one document's PDF bytes, last request wins.
//!
//! Loading is two sequential steps against the [`DocumentStore`]: resolve a
//! content locator for the document id, then download the payload behind
//! it. The download is bounded by a timeout; the locator lookup is not.
//!
//! ## Stale responses
//!
//! Every call to [`ContentLoader::begin`] issues a fresh [`LoadTicket`].
//! A completion is applied only if it carries the ticket that is tracked
//! right now, so a slow response for an earlier request (another document,
//! or an earlier attempt at the same one) can never overwrite newer state.
//! Superseding the ticket is the only cancellation there is: the old fetch
//! is left to finish and its result is dropped.

use crate::error::SessionError;
use crate::services::DocumentStore;
use crate::session::DocumentId;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Load state of the tracked document's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentLoadState {
    /// Nothing requested yet.
    #[default]
    Idle,
    Loading,
    Ready(Bytes),
    /// Human-readable cause, shown verbatim in the viewer's error panel.
    Failed(String),
}

impl ContentLoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentLoadState::Ready(_) | ContentLoadState::Failed(_))
    }

    pub fn content(&self) -> Option<&Bytes> {
        match self {
            ContentLoadState::Ready(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Token identifying one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// Owns [`ContentLoadState`] for the currently tracked document.
#[derive(Debug, Default)]
pub struct ContentLoader {
    state: ContentLoadState,
    tracked: Option<(DocumentId, LoadTicket)>,
    issued: u64,
}

impl ContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ContentLoadState {
        &self.state
    }

    pub fn tracked_document(&self) -> Option<&DocumentId> {
        self.tracked.as_ref().map(|(id, _)| id)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        matches!(self.tracked, Some((_, t)) if t == ticket)
    }

    /// Start (or restart) loading `document_id`.
    ///
    /// Drops whatever was cached or in flight before and moves to
    /// [`ContentLoadState::Loading`]. The caller performs the fetch and
    /// hands the outcome back through [`ContentLoader::complete`].
    pub fn begin(&mut self, document_id: &DocumentId) -> LoadTicket {
        self.issued += 1;
        let ticket = LoadTicket(self.issued);

        if let Some((previous, _)) = &self.tracked {
            if previous != document_id {
                debug!("Discarding content state for superseded document {}", previous);
            }
        }

        self.tracked = Some((document_id.clone(), ticket));
        self.state = ContentLoadState::Loading;
        ticket
    }

    /// Apply a fetch outcome. Returns `false` (and changes nothing) when the
    /// ticket is stale or the tracked load already finished.
    pub fn complete(&mut self, ticket: LoadTicket, outcome: Result<Bytes, SessionError>) -> bool {
        if !self.is_current(ticket) || self.state != ContentLoadState::Loading {
            debug!("Ignoring stale content response {:?}", ticket);
            return false;
        }

        self.state = match outcome {
            Ok(bytes) => {
                info!("PDF content ready: {} bytes", bytes.len());
                ContentLoadState::Ready(bytes)
            }
            Err(e) => {
                warn!("PDF load error: {}", e);
                ContentLoadState::Failed(format!("Failed to load PDF: {e}"))
            }
        };
        true
    }
}

/// Resolve the locator, then download the payload within `timeout`.
pub async fn fetch(
    store: &dyn DocumentStore,
    document_id: &DocumentId,
    timeout: Duration,
) -> Result<Bytes, SessionError> {
    debug!("Fetching document info for {}", document_id);
    let locator = store.resolve_locator(document_id).await?;

    info!("Downloading PDF: {}", locator);
    let start = Instant::now();
    match tokio::time::timeout(timeout, store.fetch_content(&locator)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::ContentTimeout {
            locator: locator.0,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ContentLocator;
    use async_trait::async_trait;

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    #[test]
    fn begin_moves_to_loading() {
        let mut loader = ContentLoader::new();
        assert_eq!(loader.state(), &ContentLoadState::Idle);
        loader.begin(&id("a"));
        assert_eq!(loader.state(), &ContentLoadState::Loading);
        assert_eq!(loader.tracked_document().map(DocumentId::as_str), Some("a"));
    }

    #[test]
    fn stale_response_for_previous_document_is_dropped() {
        let mut loader = ContentLoader::new();
        let a = loader.begin(&id("a"));
        let b = loader.begin(&id("b"));

        assert!(!loader.complete(a, Ok(Bytes::from_static(b"%PDF-a"))));
        assert_eq!(loader.state(), &ContentLoadState::Loading);

        assert!(loader.complete(b, Ok(Bytes::from_static(b"%PDF-b"))));
        assert_eq!(loader.state().content().unwrap().as_ref(), b"%PDF-b");

        // late failure for A after B is ready changes nothing either
        assert!(!loader.complete(
            a,
            Err(SessionError::ContentTransfer {
                locator: "a".into(),
                reason: "reset".into()
            })
        ));
        assert!(loader.state().content().is_some());
    }

    #[test]
    fn restart_for_same_document_supersedes_earlier_attempt() {
        let mut loader = ContentLoader::new();
        let first = loader.begin(&id("a"));
        let second = loader.begin(&id("a"));
        assert_ne!(first, second);
        assert!(!loader.complete(first, Ok(Bytes::from_static(b"old"))));
        assert!(loader.complete(second, Ok(Bytes::from_static(b"new"))));
        assert_eq!(loader.state().content().unwrap().as_ref(), b"new");
    }

    #[test]
    fn failure_carries_readable_message() {
        let mut loader = ContentLoader::new();
        let t = loader.begin(&id("a"));
        loader.complete(
            t,
            Err(SessionError::LocatorResolution {
                document_id: "a".into(),
                reason: "HTTP 404 Not Found".into(),
            }),
        );
        match loader.state() {
            ContentLoadState::Failed(msg) => {
                assert!(msg.starts_with("Failed to load PDF: "), "got: {msg}");
                assert!(msg.contains("404"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // terminal: a second completion with the same ticket is ignored
        assert!(!loader.complete(t, Ok(Bytes::new())));
    }

    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn resolve_locator(
            &self,
            document_id: &DocumentId,
        ) -> Result<ContentLocator, SessionError> {
            Ok(ContentLocator(format!("/uploads/{document_id}.pdf")))
        }

        async fn fetch_content(&self, _locator: &ContentLocator) -> Result<Bytes, SessionError> {
            tokio::time::sleep(self.delay).await;
            Ok(Bytes::from_static(b"%PDF-1.7"))
        }
    }

    #[tokio::test]
    async fn fetch_returns_payload_within_timeout() {
        let store = SlowStore {
            delay: Duration::from_millis(1),
        };
        let bytes = fetch(&store, &id("d1"), Duration::from_secs(5)).await.unwrap();
        assert_eq!(bytes.as_ref(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn fetch_times_out_on_slow_transfer() {
        let store = SlowStore {
            delay: Duration::from_secs(10),
        };
        let err = fetch(&store, &id("d1"), Duration::from_millis(20))
            .await
            .unwrap_err();
        match err {
            SessionError::ContentTimeout { locator, .. } => {
                assert_eq!(locator, "/uploads/d1.pdf")
            }
            other => panic!("expected ContentTimeout, got {other:?}"),
        }
    }
}
