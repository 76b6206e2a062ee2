//! Page access for the document scanner: rasterisation and text layers.
//!
//! [`PageSource`] is the seam between the scanner's state machine and the
//! PDF engine. Production code uses [`PdfiumPages`]; tests substitute an
//! in-memory source.
//!
//! pdfium is blocking and keeps thread-local state, so async callers run
//! everything in this module inside `tokio::task::spawn_blocking`.

use crate::error::{PageError, ScanError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// A multi-page document the scanner can render and read.
///
/// Page indices are 0-based.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Rasterise page `index` at `scale` × its natural size (72 DPI).
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, PageError>;

    /// Plain text of page `index`.
    fn page_text(&self, index: usize) -> Result<String, PageError>;
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` may name the library file or the directory holding it;
/// otherwise the working directory and then the system library path are
/// tried.
pub fn bind_pdfium() -> Result<Pdfium, ScanError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = Path::new(&p);
            if path.is_file() {
                Pdfium::bind_to_library(path)
            } else {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ScanError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// A PDF opened through pdfium.
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumPages<'a> {
    /// Open the document at `path`.
    ///
    /// # Errors
    /// [`ScanError::DecodeError`] for corrupt or password-protected files.
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, ScanError> {
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| ScanError::DecodeError {
                    what: "document",
                    detail: format!("{:?}", e),
                })?;
        info!("PDF opened: {} page(s)", document.pages().len());
        Ok(Self { document })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, PdfiumError> {
        self.document.pages().get(index as u16)
    }
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, PageError> {
        let failed = |e: PdfiumError| PageError::RenderFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page = self.page(index).map_err(failed)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page.render_with_config(&render_config).map_err(failed)?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn page_text(&self, index: usize) -> Result<String, PageError> {
        let failed = |e: PdfiumError| PageError::TextFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page = self.page(index).map_err(failed)?;
        let text = page.text().map_err(failed)?.all();
        debug!("Page {} text layer: {} chars", index + 1, text.len());
        Ok(text)
    }
}
