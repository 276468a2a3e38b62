//! PDF page counting and rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, so the controller's event loop
//! keeps running while a large page renders.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_pixels` caps the longest edge regardless
//! of physical size, keeping memory bounded for a single on-screen page.
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` may name the library file or the directory holding it.
//! When unset, the system loader is asked for `libpdfium`.

use crate::error::SessionError;
use crate::services::PageRenderer;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(target_os = "windows")]
const LIBRARY_FILE: &str = "pdfium.dll";
#[cfg(target_os = "macos")]
const LIBRARY_FILE: &str = "libpdfium.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_FILE: &str = "libpdfium.so";

/// One rendered page, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RenderedPage {
    /// Encode a rasterised page as PNG.
    ///
    /// PNG keeps rendered text crisp; JPEG artefacts around glyphs are very
    /// visible at screen resolution.
    pub fn from_image(page: u32, img: &DynamicImage) -> Result<Self, SessionError> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| SessionError::Render {
                detail: format!("PNG encoding of page {page} failed: {e}"),
            })?;
        debug!("Encoded page {} → {} bytes PNG", page, png.len());

        Ok(Self {
            page,
            width: img.width(),
            height: img.height(),
            png,
        })
    }

    /// `data:image/png;base64,…`, ready for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// [`PageRenderer`] backed by a dynamically bound pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRenderer {
    pub fn new(library_path: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            library_path,
            max_pixels,
        }
    }

    /// Use `PDFIUM_LIB_PATH` when set, else the system library.
    pub fn from_env(max_pixels: u32) -> Self {
        let library_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
        Self::new(library_path, max_pixels)
    }

    pub fn max_pixels(&self) -> u32 {
        self.max_pixels
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn page_count(&self, content: Bytes) -> Result<u32, SessionError> {
        let library = self.library_path.clone();
        tokio::task::spawn_blocking(move || page_count_blocking(library.as_deref(), &content))
            .await
            .map_err(|e| SessionError::Internal(format!("Page count task panicked: {}", e)))?
    }

    async fn render_page(&self, content: Bytes, page: u32) -> Result<RenderedPage, SessionError> {
        let library = self.library_path.clone();
        let max_pixels = self.max_pixels;
        tokio::task::spawn_blocking(move || {
            render_page_blocking(library.as_deref(), &content, page, max_pixels)
        })
        .await
        .map_err(|e| SessionError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, SessionError> {
    let bindings = match library {
        Some(path) => {
            let file = if path.is_dir() {
                path.join(LIBRARY_FILE)
            } else {
                path.to_path_buf()
            };
            debug!("Binding pdfium at {}", file.display());
            Pdfium::bind_to_library(&file)
                .map_err(|e| SessionError::PdfiumBindingFailed(format!("{}: {e}", file.display())))?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| SessionError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

fn page_count_blocking(library: Option<&Path>, content: &[u8]) -> Result<u32, SessionError> {
    let pdfium = bind_pdfium(library)?;
    let document = pdfium
        .load_pdf_from_byte_slice(content, None)
        .map_err(|e| SessionError::Render {
            detail: format!("{:?}", e),
        })?;

    let total = document.pages().len() as u32;
    info!("PDF loaded: {} pages", total);
    Ok(total)
}

fn render_page_blocking(
    library: Option<&Path>,
    content: &[u8],
    page: u32,
    max_pixels: u32,
) -> Result<RenderedPage, SessionError> {
    let pdfium = bind_pdfium(library)?;
    let document = pdfium
        .load_pdf_from_byte_slice(content, None)
        .map_err(|e| SessionError::Render {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total = pages.len() as u32;
    if page == 0 || page > total {
        return Err(SessionError::Render {
            detail: format!("page {page} out of range (document has {total})"),
        });
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pdf_page = pages
        .get((page - 1) as u16)
        .map_err(|e| SessionError::Render {
            detail: format!("page {page}: {:?}", e),
        })?;
    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| SessionError::Render {
            detail: format!("page {page}: {:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page,
        image.width(),
        image.height()
    );
    RenderedPage::from_image(page, &image)
}
