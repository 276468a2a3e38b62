//! Display models for the viewer and chat panes.
//!
//! Everything here is a pure function of a [`SessionSnapshot`]: no I/O, no
//! state. A GUI binds these models to widgets; the CLI prints them through
//! their `Display` impls. Citation buttons carry the `(message, source,
//! index)` triple that [`crate::SessionController::activate_citation`]
//! expects, so clicking a button never has to re-parse text.

use crate::session::{
    Author, CitationSource, ContentSummary, Message, MessageId, MessageStatus, Segment,
    SessionPhase, SessionSnapshot, PENDING_TEXT,
};
use serde::Serialize;
use std::fmt;

pub use crate::session::document::FALLBACK_TITLE;

/// Shown while content is being fetched.
pub const LOADING_TEXT: &str = "Loading PDF from server...";

// ── Viewer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewerView {
    /// No document uploaded yet.
    Empty,
    Loading {
        title: String,
    },
    /// Content or render failure, with hints for finding the cause.
    Error {
        title: String,
        message: String,
        troubleshooting: Vec<String>,
    },
    Page {
        title: String,
        /// `"x.pdf - Page 2 of 5"`
        header: String,
        current: u32,
        total: u32,
        can_previous: bool,
        can_next: bool,
    },
}

/// Project the viewer pane. `base_url` feeds the troubleshooting hints.
pub fn viewer(snapshot: &SessionSnapshot, base_url: &str) -> ViewerView {
    let Some(document) = &snapshot.document else {
        return ViewerView::Empty;
    };
    let title = document.display_name().to_string();

    let failure = match &snapshot.content {
        ContentSummary::Idle | ContentSummary::Loading => {
            return ViewerView::Loading { title };
        }
        ContentSummary::Failed { message } => Some(message.clone()),
        ContentSummary::Ready { .. } => snapshot.render_error.clone(),
    };

    if let Some(message) = failure {
        return ViewerView::Error {
            title,
            message,
            troubleshooting: troubleshooting(base_url),
        };
    }

    let p = snapshot.pagination;
    ViewerView::Page {
        header: format!("{} - Page {} of {}", title, p.current(), p.total()),
        title,
        current: p.current(),
        total: p.total(),
        can_previous: p.can_go_previous(),
        can_next: p.can_go_next(),
    }
}

fn troubleshooting(base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    vec![
        format!("1. Is backend running on {base}?"),
        format!("2. Open this URL directly: {base}/uploads/..."),
    ]
}

impl fmt::Display for ViewerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerView::Empty => write!(f, "No document loaded."),
            ViewerView::Loading { title } => write!(f, "{title}\n{LOADING_TEXT}"),
            ViewerView::Error {
                title,
                message,
                troubleshooting,
            } => {
                writeln!(f, "{title} - Error")?;
                writeln!(f, "{message}")?;
                write!(f, "Troubleshooting:")?;
                for line in troubleshooting {
                    write!(f, "\n  {line}")?;
                }
                Ok(())
            }
            ViewerView::Page {
                header,
                can_previous,
                can_next,
                ..
            } => {
                let prev = if *can_previous { "[Previous]" } else { " Previous " };
                let next = if *can_next { "[Next]" } else { " Next " };
                write!(f, "{header}   {prev} {next}")
            }
        }
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    /// `Chat with "x.pdf"`
    pub header: String,
    pub entries: Vec<ChatEntry>,
    /// The input box accepts a question.
    pub input_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub message: MessageId,
    pub author: Author,
    pub status: MessageStatus,
    pub parts: Vec<ChatPart>,
    /// Structured citations, drawn after the text.
    pub trailing: Vec<CitationButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatPart {
    Text { text: String },
    Citation(CitationButton),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationButton {
    pub label: String,
    pub page: u32,
    pub source: CitationSource,
    pub index: usize,
}

pub fn chat(snapshot: &SessionSnapshot) -> ChatView {
    let header = match &snapshot.document {
        Some(d) => format!("Chat with \"{}\"", d.display_name()),
        None => "Chat".to_string(),
    };
    ChatView {
        header,
        entries: snapshot.messages.iter().map(ChatEntry::from).collect(),
        input_enabled: snapshot.phase != SessionPhase::NoDocument && !snapshot.awaiting_answer,
    }
}

impl From<&Message> for ChatEntry {
    fn from(message: &Message) -> Self {
        if message.author == Author::User || message.is_pending() {
            let text = if message.is_pending() {
                PENDING_TEXT.to_string()
            } else {
                message.text.clone()
            };
            return ChatEntry {
                message: message.id,
                author: message.author,
                status: message.status,
                parts: vec![ChatPart::Text { text }],
                trailing: Vec::new(),
            };
        }

        let mut inline_index = 0;
        let parts = message
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Text { text } => ChatPart::Text { text: text.clone() },
                Segment::Citation { page, .. } => {
                    let button = CitationButton {
                        label: format!("Page {page}"),
                        page: *page,
                        source: CitationSource::Inline,
                        index: inline_index,
                    };
                    inline_index += 1;
                    ChatPart::Citation(button)
                }
            })
            .collect();

        let trailing = message
            .citations
            .iter()
            .enumerate()
            .map(|(index, c)| CitationButton {
                label: format!("[{}]", c.first_page()),
                page: c.first_page(),
                source: CitationSource::Structured,
                index,
            })
            .collect();

        ChatEntry {
            message: message.id,
            author: message.author,
            status: message.status,
            parts,
            trailing,
        }
    }
}

impl ChatEntry {
    /// Every button in draw order, inline first.
    pub fn buttons(&self) -> impl Iterator<Item = &CitationButton> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ChatPart::Citation(b) => Some(b),
                ChatPart::Text { .. } => None,
            })
            .chain(self.trailing.iter())
    }
}

impl fmt::Display for ChatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.author {
            Author::User => "you",
            Author::Assistant => "assistant",
        };
        write!(f, "{who}> ")?;
        for part in &self.parts {
            match part {
                ChatPart::Text { text } => f.write_str(text)?,
                ChatPart::Citation(b) => write!(f, "<{}>", b.label)?,
            }
        }
        for b in &self.trailing {
            write!(f, " {}", b.label)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        for entry in &self.entries {
            write!(f, "\n{entry}")?;
        }
        Ok(())
    }
}
