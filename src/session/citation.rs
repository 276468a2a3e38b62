//! Citation parsing: find `[Page N]` markers in assistant answers.
//!
//! Answers reference source pages inline, e.g. `"It is about X [Page 2]."`.
//! The chat view needs two things from such text:
//!
//! 1. the ordered list of cited pages ([`extract`]), and
//! 2. a segmentation of the text into plain runs and clickable markers
//!    ([`segment`]) so a renderer can draw the answer in place with the
//!    markers turned into buttons.
//!
//! Only the exact, case-sensitive literal `[Page <digits>]` is a marker.
//! Anything else (`[page 2]`, `[Page two]`, `[Page 3`) stays plain text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A reference from assistant text to one or more source pages.
///
/// Always holds at least one page, every page ≥ 1. Construct through
/// [`CitationRef::new`] or [`CitationRef::single`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationRef {
    page_numbers: Vec<u32>,
}

impl CitationRef {
    /// Build a citation from raw page numbers.
    ///
    /// Pages below 1 are dropped; returns `None` when nothing remains.
    pub fn new(pages: impl IntoIterator<Item = i64>) -> Option<Self> {
        let page_numbers: Vec<u32> = pages
            .into_iter()
            .filter_map(|p| u32::try_from(p).ok())
            .filter(|&p| p >= 1)
            .collect();
        if page_numbers.is_empty() {
            None
        } else {
            Some(Self { page_numbers })
        }
    }

    /// A citation of exactly one page. Returns `None` for page 0.
    pub fn single(page: u32) -> Option<Self> {
        (page >= 1).then(|| Self {
            page_numbers: vec![page],
        })
    }

    pub fn page_numbers(&self) -> &[u32] {
        &self.page_numbers
    }

    /// The page a click on this citation navigates to.
    pub fn first_page(&self) -> u32 {
        self.page_numbers[0]
    }
}

/// Wire shape of a structured citation.
///
/// The document service sends `{"pages": [..]}`; some payloads use
/// `{"pageNumbers": [..]}`, and some carry both. `pages` wins when it holds
/// a valid page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireCitation {
    #[serde(default)]
    pub pages: Option<Vec<i64>>,
    #[serde(rename = "pageNumbers", default)]
    pub page_numbers: Option<Vec<i64>>,
}

impl WireCitation {
    /// Normalise into a [`CitationRef`]; `None` when no valid page remains.
    pub fn to_citation(&self) -> Option<CitationRef> {
        let from = |pages: &Option<Vec<i64>>| {
            pages
                .as_deref()
                .and_then(|p| CitationRef::new(p.iter().copied()))
        };
        from(&self.pages).or_else(|| from(&self.page_numbers))
    }
}

/// One renderable piece of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text, rendered as-is.
    Text { text: String },
    /// An inline `[Page N]` marker; `marker` keeps the literal source text.
    Citation { marker: String, page: u32 },
}

impl Segment {
    pub fn citation(&self) -> Option<CitationRef> {
        match self {
            Segment::Citation { page, .. } => CitationRef::single(*page),
            Segment::Text { .. } => None,
        }
    }
}

static RE_PAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Page ([0-9]+)\]").unwrap());

/// Extract inline page citations in left-to-right order.
pub fn extract(text: &str) -> Vec<CitationRef> {
    markers(text)
        .filter_map(|(_, page)| CitationRef::single(page))
        .collect()
}

/// Split `text` into alternating plain-text and citation segments.
///
/// Text without markers comes back as a single [`Segment::Text`] equal to
/// the whole input (including the empty string). Adjacent markers produce
/// no empty text segment between them.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for (range, page) in markers(text) {
        if range.start > cursor {
            segments.push(Segment::Text {
                text: text[cursor..range.start].to_string(),
            });
        }
        segments.push(Segment::Citation {
            marker: text[range.clone()].to_string(),
            page,
        });
        cursor = range.end;
    }

    if cursor < text.len() || segments.is_empty() {
        segments.push(Segment::Text {
            text: text[cursor..].to_string(),
        });
    }
    segments
}

/// Valid markers with their byte range. Page 0 and numbers that overflow
/// `u32` are not markers and fall through as plain text.
fn markers(text: &str) -> impl Iterator<Item = (std::ops::Range<usize>, u32)> + '_ {
    RE_PAGE_MARKER.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let page: u32 = caps[1].parse().ok()?;
        (page >= 1).then(|| (whole.range(), page))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text { text: s.into() }
    }

    fn cite(page: u32) -> Segment {
        Segment::Citation {
            marker: format!("[Page {page}]"),
            page,
        }
    }

    fn pages(refs: &[CitationRef]) -> Vec<u32> {
        refs.iter().map(CitationRef::first_page).collect()
    }

    #[test]
    fn empty_input() {
        assert!(extract("").is_empty());
        assert_eq!(segment(""), vec![text("")]);
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert!(extract("plain text").is_empty());
        assert_eq!(segment("plain text"), vec![text("plain text")]);
    }

    #[test]
    fn two_markers_in_order() {
        let s = "See [Page 3] and [Page 12].";
        assert_eq!(pages(&extract(s)), vec![3, 12]);
        assert_eq!(
            segment(s),
            vec![text("See "), cite(3), text(" and "), cite(12), text(".")]
        );
    }

    #[test]
    fn multi_digit_and_adjacent_markers() {
        let s = "[Page 104][Page 7]";
        assert_eq!(pages(&extract(s)), vec![104, 7]);
        assert_eq!(segment(s), vec![cite(104), cite(7)]);
    }

    #[test]
    fn malformed_markers_stay_text() {
        for s in [
            "[page 2]",
            "[Page two]",
            "[Page 3",
            "Page 3]",
            "[Page  3]",
            "[Page 3, 4]",
            "[Page -1]",
            "[Page 0]",
            "[Page 99999999999]",
        ] {
            assert!(extract(s).is_empty(), "{s:?} should not be a citation");
            assert_eq!(segment(s), vec![text(s)]);
        }
    }

    #[test]
    fn segments_reassemble_input_text() {
        let s = "A [Page 1] b [bad] c [Page 22]";
        let rebuilt: String = segment(s)
            .iter()
            .map(|seg| match seg {
                Segment::Text { text } => text.as_str(),
                Segment::Citation { marker, .. } => marker.as_str(),
            })
            .collect();
        assert_eq!(rebuilt, s);
    }

    #[test]
    fn citation_ref_rejects_empty_and_non_positive() {
        assert!(CitationRef::new(Vec::<i64>::new()).is_none());
        assert!(CitationRef::new(vec![0, -3]).is_none());
        let c = CitationRef::new(vec![0, 4, 9]).unwrap();
        assert_eq!(c.page_numbers(), &[4, 9]);
        assert_eq!(c.first_page(), 4);
        assert!(CitationRef::single(0).is_none());
    }

    #[test]
    fn wire_citation_accepts_both_spellings() {
        let a: WireCitation = serde_json::from_str(r#"{"pages":[5,6]}"#).unwrap();
        let b: WireCitation = serde_json::from_str(r#"{"pageNumbers":[5]}"#).unwrap();
        let c: WireCitation = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(a.to_citation().unwrap().page_numbers(), &[5, 6]);
        assert_eq!(b.to_citation().unwrap().first_page(), 5);
        assert!(c.to_citation().is_none());
    }

    #[test]
    fn wire_citation_with_both_keys_prefers_pages() {
        let both: WireCitation =
            serde_json::from_str(r#"{"pages":[1],"pageNumbers":[7]}"#).unwrap();
        assert_eq!(both.to_citation().unwrap().page_numbers(), &[1]);

        let empty_pages: WireCitation =
            serde_json::from_str(r#"{"pages":[0],"pageNumbers":[7]}"#).unwrap();
        assert_eq!(empty_pages.to_citation().unwrap().first_page(), 7);

        let nulls: WireCitation =
            serde_json::from_str(r#"{"pages":null,"pageNumbers":null}"#).unwrap();
        assert!(nulls.to_citation().is_none());
    }
}
