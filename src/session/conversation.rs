//! Conversation log: ordered messages with pending-answer tracking.
//!
//! Submitting a question appends two entries at once: the user's message
//! (final immediately) and an assistant placeholder in the `Pending` state.
//! When the answer arrives the placeholder is replaced *in place* by the
//! final (or errored) message, so message order is always submission order
//! regardless of the order responses come back in.
//!
//! Each exchange is keyed by its own [`QueryTicket`]; resolving with a
//! ticket that is unknown (already resolved, or never issued) is a no-op.

use crate::error::SessionError;
use crate::services::Answer;
use crate::session::citation::{self, CitationRef, Segment};
use serde::Serialize;
use tracing::{debug, warn};

/// Shown when the service answers with empty text.
pub const NO_ANSWER_TEXT: &str = "No answer.";

/// Shown in place of any query failure. The raw error is only logged.
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Placeholder text of a pending assistant message.
pub const PENDING_TEXT: &str = "Thinking...";

/// Stable identifier of one message within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(u64);

/// Token identifying one in-flight question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Final,
    Pending,
    Errored,
}

/// Which producer a citation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationSource {
    /// A `[Page N]` marker inside the answer text.
    Inline,
    /// An entry of the answer payload's citation list.
    Structured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub text: String,
    /// Structured citations from the answer payload, in payload order.
    pub citations: Vec<CitationRef>,
    /// Renderable split of `text` around inline `[Page N]` markers.
    pub segments: Vec<Segment>,
    pub status: MessageStatus,
}

impl Message {
    fn new(id: MessageId, author: Author, text: String, status: MessageStatus) -> Self {
        let segments = vec![Segment::Text { text: text.clone() }];
        Self {
            id,
            author,
            text,
            citations: Vec::new(),
            segments,
            status,
        }
    }

    fn answer(id: MessageId, answer: Answer) -> Self {
        let text = if answer.text.is_empty() {
            NO_ANSWER_TEXT.to_string()
        } else {
            answer.text
        };
        Self {
            id,
            author: Author::Assistant,
            segments: citation::segment(&text),
            text,
            citations: answer.citations,
            status: MessageStatus::Final,
        }
    }

    /// Inline `[Page N]` citations, left to right.
    pub fn inline_citations(&self) -> Vec<CitationRef> {
        self.segments.iter().filter_map(Segment::citation).collect()
    }

    /// The `index`-th citation of the given source, if any.
    pub fn citation(&self, source: CitationSource, index: usize) -> Option<CitationRef> {
        match source {
            CitationSource::Inline => self.inline_citations().into_iter().nth(index),
            CitationSource::Structured => self.citations.get(index).cloned(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// A question accepted for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: QueryTicket,
    /// Trimmed question text to send to the query service.
    pub question: String,
    pub user_message: MessageId,
    pub pending_message: MessageId,
}

#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    in_flight: Vec<(QueryTicket, MessageId)>,
    next_message: u64,
    next_ticket: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that opens with the assistant greeting for `filename`.
    pub fn with_greeting(filename: &str) -> Self {
        let mut log = Self::new();
        let id = log.allocate_id();
        log.messages.push(Message::new(
            id,
            Author::Assistant,
            format!("Hello! I've loaded \"{filename}\". Ask me anything about the document!"),
            MessageStatus::Final,
        ));
        log
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `true` while any answer is outstanding.
    pub fn is_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Accept a question, unless it is blank or another answer is pending.
    pub fn begin(&mut self, question: &str) -> Option<Dispatch> {
        if question.trim().is_empty() {
            return None;
        }
        if self.is_pending() {
            debug!("Ignoring submission while an answer is pending");
            return None;
        }
        Some(self.append_exchange(question))
    }

    /// Append the user message and its pending placeholder. No guard.
    fn append_exchange(&mut self, question: &str) -> Dispatch {
        let user_message = self.allocate_id();
        self.messages.push(Message::new(
            user_message,
            Author::User,
            question.to_string(),
            MessageStatus::Final,
        ));

        let pending_message = self.allocate_id();
        self.messages.push(Message::new(
            pending_message,
            Author::Assistant,
            PENDING_TEXT.to_string(),
            MessageStatus::Pending,
        ));

        self.next_ticket += 1;
        let ticket = QueryTicket(self.next_ticket);
        self.in_flight.push((ticket, pending_message));

        Dispatch {
            ticket,
            question: question.trim().to_string(),
            user_message,
            pending_message,
        }
    }

    /// Replace the pending message for `ticket` with its outcome.
    ///
    /// Returns the replaced message, or `None` if the ticket is unknown.
    pub fn resolve(
        &mut self,
        ticket: QueryTicket,
        outcome: Result<Answer, SessionError>,
    ) -> Option<&Message> {
        let slot = self.in_flight.iter().position(|(t, _)| *t == ticket)?;
        let (_, id) = self.in_flight.remove(slot);
        let index = self.messages.iter().position(|m| m.id == id)?;

        self.messages[index] = match outcome {
            Ok(answer) => Message::answer(id, answer),
            Err(e) => {
                warn!("Query failed: {}", e);
                Message::new(
                    id,
                    Author::Assistant,
                    APOLOGY_TEXT.to_string(),
                    MessageStatus::Errored,
                )
            }
        };
        Some(&self.messages[index])
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_message += 1;
        MessageId(self.next_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(log: &ConversationLog) -> Vec<(Author, MessageStatus)> {
        log.messages().iter().map(|m| (m.author, m.status)).collect()
    }

    #[test]
    fn begin_appends_user_then_pending() {
        let mut log = ConversationLog::new();
        let d = log.begin("  what is this?  ").unwrap();
        assert_eq!(d.question, "what is this?");
        assert_eq!(
            statuses(&log),
            vec![
                (Author::User, MessageStatus::Final),
                (Author::Assistant, MessageStatus::Pending)
            ]
        );
        assert_eq!(log.messages()[0].text, "  what is this?  ");
        assert_eq!(log.messages()[1].text, PENDING_TEXT);
        assert!(log.is_pending());
    }

    #[test]
    fn blank_question_is_ignored() {
        let mut log = ConversationLog::new();
        assert!(log.begin("").is_none());
        assert!(log.begin(" \n\t").is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn submission_while_pending_is_a_no_op() {
        let mut log = ConversationLog::new();
        log.begin("first").unwrap();
        assert!(log.begin("second").is_none());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn answer_replaces_pending_in_place() {
        let mut log = ConversationLog::with_greeting("x.pdf");
        let d = log.begin("q").unwrap();
        let citations = vec![CitationRef::single(4).unwrap()];
        let resolved = log
            .resolve(d.ticket, Ok(Answer::new("It is about X [Page 2].", citations)))
            .unwrap();
        assert_eq!(resolved.id, d.pending_message);
        assert_eq!(resolved.status, MessageStatus::Final);

        assert_eq!(log.len(), 3);
        let msg = &log.messages()[2];
        assert_eq!(msg.text, "It is about X [Page 2].");
        assert_eq!(msg.citations[0].first_page(), 4);
        assert_eq!(msg.inline_citations()[0].first_page(), 2);
        assert_eq!(msg.citation(CitationSource::Inline, 0).unwrap().first_page(), 2);
        assert_eq!(msg.citation(CitationSource::Structured, 0).unwrap().first_page(), 4);
        assert!(msg.citation(CitationSource::Structured, 1).is_none());
        assert!(!log.is_pending());
    }

    #[test]
    fn empty_answer_uses_fallback() {
        let mut log = ConversationLog::new();
        let d = log.begin("q").unwrap();
        log.resolve(d.ticket, Ok(Answer::default()));
        assert_eq!(log.messages()[1].text, NO_ANSWER_TEXT);
    }

    #[test]
    fn failure_becomes_fixed_apology() {
        let mut log = ConversationLog::new();
        let d = log.begin("q").unwrap();
        log.resolve(
            d.ticket,
            Err(SessionError::QueryService {
                status: 500,
                message: "stack trace here".into(),
            }),
        );
        let msg = &log.messages()[1];
        assert_eq!(msg.status, MessageStatus::Errored);
        assert_eq!(msg.text, APOLOGY_TEXT);
        assert!(!msg.text.contains("stack trace"));
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let mut log = ConversationLog::new();
        let d = log.begin("q").unwrap();
        assert!(log.resolve(d.ticket, Ok(Answer::new("a", vec![]))).is_some());
        assert!(log.resolve(d.ticket, Ok(Answer::new("b", vec![]))).is_none());
        assert_eq!(log.messages()[1].text, "a");
    }

    #[test]
    fn order_follows_submission_even_without_guard() {
        let mut log = ConversationLog::new();
        let first = log.append_exchange("one");
        let second = log.append_exchange("two");

        // answers arrive in reverse order
        log.resolve(second.ticket, Ok(Answer::new("answer two", vec![])));
        log.resolve(first.ticket, Ok(Answer::new("answer one", vec![])));

        let texts: Vec<&str> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "answer one", "two", "answer two"]);
    }

    #[test]
    fn greeting_names_the_file() {
        let log = ConversationLog::with_greeting("report.pdf");
        assert_eq!(log.len(), 1);
        assert!(log.messages()[0].text.contains("\"report.pdf\""));
        assert!(!log.is_pending());
    }
}
