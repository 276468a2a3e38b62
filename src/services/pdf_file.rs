//! Local PDF files to upload.
//!
//! Uploads are validated before anything goes over the wire: the file must
//! exist, be readable, and start with the `%PDF` magic bytes. A bad path
//! then fails fast with a precise error instead of a vague server-side
//! rejection after a 60-second upload.

use crate::error::SessionError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A validated PDF ready for upload.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl PdfFile {
    /// Read and validate a PDF from disk.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(SessionError::PermissionDenied { path });
            }
            Err(_) => return Err(SessionError::FileNotFound { path }),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let file = Self::from_bytes(filename, bytes, &path)?;
        debug!("Validated local PDF: {} ({} bytes)", path.display(), file.bytes.len());
        Ok(file)
    }

    /// Wrap in-memory bytes, checking the PDF magic.
    ///
    /// `origin` is only used in the error message.
    pub fn from_bytes(
        filename: impl Into<String>,
        bytes: impl Into<Bytes>,
        origin: &Path,
    ) -> Result<Self, SessionError> {
        let bytes = bytes.into();
        if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(SessionError::NotAPdf {
                path: PathBuf::from(origin),
                magic,
            });
        }
        Ok(Self {
            filename: filename.into(),
            bytes,
        })
    }

    /// Size in megabytes, for "Selected: x.pdf (1.23 MB)" style displays.
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}
