//! Document identity for one session.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title used when the upload carried no filename.
pub const FALLBACK_TITLE: &str = "Document";

/// Opaque, non-empty document identifier assigned by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a raw identifier. Empty (or all-whitespace) ids are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(SessionError::EmptyDocumentId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the upload service hands back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub document_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub page_count: u32,
}

/// The uploaded document. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub declared_page_count: u32,
}

impl Document {
    /// Title shown in viewer and chat headers.
    pub fn display_name(&self) -> &str {
        if self.filename.is_empty() {
            FALLBACK_TITLE
        } else {
            &self.filename
        }
    }
}

impl TryFrom<UploadReceipt> for Document {
    type Error = SessionError;

    fn try_from(receipt: UploadReceipt) -> Result<Self, Self::Error> {
        Ok(Self {
            id: DocumentId::new(receipt.document_id)?,
            filename: receipt.filename,
            declared_page_count: receipt.page_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_is_rejected() {
        assert!(matches!(DocumentId::new(""), Err(SessionError::EmptyDocumentId)));
        assert!(matches!(DocumentId::new("  "), Err(SessionError::EmptyDocumentId)));
        assert_eq!(DocumentId::new("d1").unwrap().as_str(), "d1");
    }

    #[test]
    fn receipt_from_camel_case_json() {
        let r: UploadReceipt =
            serde_json::from_str(r#"{"documentId":"d1","filename":"x.pdf","pageCount":5}"#)
                .unwrap();
        let doc = Document::try_from(r).unwrap();
        assert_eq!(doc.id.as_str(), "d1");
        assert_eq!(doc.filename, "x.pdf");
        assert_eq!(doc.declared_page_count, 5);
    }

    #[test]
    fn display_name_falls_back() {
        let doc = Document {
            id: DocumentId::new("d1").unwrap(),
            filename: String::new(),
            declared_page_count: 0,
        };
        assert_eq!(doc.display_name(), "Document");
    }
}
