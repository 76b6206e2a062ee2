//! Document scanning: a two-stage fallback state machine over PDF pages.
//!
//! ```text
//!  QrPerPage ──(no usable QR)──▶ TextFallback ──(no key fields)──▶ ExtractionFailed
//!      │                              │
//!      └──▶ (fields, pdf-qr)          └──▶ (fields, pdf-text)
//! ```
//!
//! Stages run in order and stop at the first success. Within the QR stage,
//! the first page that yields a symbol ends the page loop: later pages are
//! never rendered.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::input::StagedDocument;
use crate::pipeline::qr::QrLocator;
use crate::pipeline::render::{bind_pdfium, PageSource, PdfiumPages};
use crate::record::{Provenance, RecordFields};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Named stages of the document state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    QrPerPage,
    TextFallback,
}

impl Stage {
    /// The stage entered when this one fails; `None` is terminal failure.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::QrPerPage => Some(Stage::TextFallback),
            Stage::TextFallback => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::QrPerPage => "qr-per-page",
            Stage::TextFallback => "text-fallback",
        })
    }
}

/// Fields recovered from a document and where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub fields: RecordFields,
    pub provenance: Provenance,
    /// 1-based page carrying the QR symbol, for QR extractions.
    pub page: Option<usize>,
}

/// Runs the QR-then-text fallback over a document.
#[derive(Debug, Clone)]
pub struct DocumentScanner {
    extractor: FieldExtractor,
    locator: QrLocator,
    render_scale: f32,
}

impl DocumentScanner {
    pub fn new(config: &ScanConfig, extractor: FieldExtractor) -> Self {
        Self {
            extractor,
            locator: QrLocator::new(),
            render_scale: config.render_scale,
        }
    }

    /// Stage `bytes` on disk, open them with pdfium and scan.
    ///
    /// The staged file is removed before this returns, whatever the outcome.
    pub fn process(&self, bytes: &[u8]) -> Result<Extraction, ScanError> {
        info!("Processing document ({} bytes)", bytes.len());
        let staged = StagedDocument::stage(bytes)?;
        let pdfium = bind_pdfium()?;
        let pages = PdfiumPages::open(&pdfium, staged.path())?;
        self.scan(&pages)
    }

    /// Drive the state machine over any page source.
    pub fn scan(&self, source: &dyn PageSource) -> Result<Extraction, ScanError> {
        let mut attempts = Vec::new();
        let mut stage = Some(Stage::QrPerPage);

        while let Some(current) = stage {
            debug!("Entering stage {current}");
            let outcome = match current {
                Stage::QrPerPage => self.qr_per_page(source),
                Stage::TextFallback => self.text_fallback(source),
            };
            match outcome {
                Ok(extraction) => {
                    info!(
                        "Document extracted via {} ({} field(s))",
                        extraction.provenance,
                        extraction.fields.len()
                    );
                    return Ok(extraction);
                }
                Err(reason) => {
                    info!("Stage {current} exhausted: {reason}");
                    attempts.push((current, reason));
                    stage = current.next();
                }
            }
        }

        error!("No stage produced a usable record");
        Err(ScanError::ExtractionFailed {
            pages: source.page_count(),
            attempts,
        })
    }

    fn qr_per_page(&self, source: &dyn PageSource) -> Result<Extraction, String> {
        let total = source.page_count();
        if total == 0 {
            return Err("document has no pages".into());
        }

        let mut render_failures = 0usize;
        for index in 0..total {
            let page_num = index + 1;
            debug!("QR scan of page {page_num}/{total}");

            let image = match source.render_page(index, self.render_scale) {
                Ok(image) => image,
                Err(e) => {
                    warn!("{e}");
                    render_failures += 1;
                    continue;
                }
            };
            let Some(payload) = self.locator.decode_image(&image) else {
                continue;
            };
            info!("QR found on page {page_num}");

            // The first symbol decides this stage; remaining pages are skipped.
            return match self.extractor.parse_qr(&payload) {
                Ok(fields) if fields.has_key_fields() => Ok(Extraction {
                    fields,
                    provenance: Provenance::PdfQr,
                    page: Some(page_num),
                }),
                Ok(_) => Err(format!("QR on page {page_num} has neither Folio nor CURP")),
                Err(e) => Err(format!("QR on page {page_num}: {e}")),
            };
        }

        if render_failures > 0 {
            Err(format!(
                "no QR symbol on {total} page(s), {render_failures} failed to render"
            ))
        } else {
            Err(format!("no QR symbol on {total} page(s)"))
        }
    }

    fn text_fallback(&self, source: &dyn PageSource) -> Result<Extraction, String> {
        let mut text = String::new();
        for index in 0..source.page_count() {
            match source.page_text(index) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => warn!("{e}"),
            }
        }
        info!("Text layer extracted ({} chars)", text.len());

        if text.trim().is_empty() {
            return Err("document has no text layer".into());
        }

        self.extractor
            .parse_certificate_text(&text)
            .map(|fields| Extraction {
                fields,
                provenance: Provenance::PdfText,
                page: None,
            })
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::record::Field;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Blank pages with a fixed text layer.
    struct BlankPages {
        pages: usize,
        text: &'static str,
    }

    impl PageSource for BlankPages {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&self, index: usize, _scale: f32) -> Result<DynamicImage, PageError> {
            if index == 0 {
                return Err(PageError::RenderFailed {
                    page: 1,
                    detail: "boom".into(),
                });
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                40,
                40,
                Rgb([255, 255, 255]),
            )))
        }

        fn page_text(&self, _index: usize) -> Result<String, PageError> {
            Ok(self.text.to_string())
        }
    }

    fn scanner() -> DocumentScanner {
        let config = ScanConfig::default();
        DocumentScanner::new(&config, FieldExtractor::new(&config).unwrap())
    }

    #[test]
    fn stage_transitions() {
        assert_eq!(Stage::QrPerPage.next(), Some(Stage::TextFallback));
        assert_eq!(Stage::TextFallback.next(), None);
        assert_eq!(Stage::TextFallback.to_string(), "text-fallback");
    }

    #[test]
    fn render_failure_falls_through_to_text() {
        let source = BlankPages {
            pages: 2,
            text: "Identificador Electrónico 5550001\n",
        };
        let extraction = scanner().scan(&source).unwrap();
        assert_eq!(extraction.provenance, Provenance::PdfText);
        assert_eq!(extraction.page, None);
        assert_eq!(
            extraction.fields.text(Field::Folio).as_deref(),
            Some("5550001")
        );
    }

    #[test]
    fn both_stages_failing_reports_each() {
        let source = BlankPages {
            pages: 2,
            text: "nothing useful",
        };
        match scanner().scan(&source) {
            Err(ScanError::ExtractionFailed { pages, attempts }) => {
                assert_eq!(pages, 2);
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].0, Stage::QrPerPage);
                assert!(attempts[0].1.contains("1 failed to render"), "{:?}", attempts);
                assert_eq!(attempts[1].0, Stage::TextFallback);
            }
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_fails() {
        let source = BlankPages { pages: 0, text: "" };
        assert!(matches!(
            scanner().scan(&source),
            Err(ScanError::ExtractionFailed { pages: 0, .. })
        ));
    }
}
