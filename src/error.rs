//! Error types for the acta-scan library.
//!
//! Three error types mirror the three places a scan can stop:
//!
//! * [`ScanError`] (surfaced): the inbound payload could not be turned
//!   into a stored record (corrupt image, unreadable PDF, both extraction
//!   stages exhausted, store rejection). Returned as `Err(ScanError)` from
//!   the [`crate::intake::Intake`] entry points.
//!
//! * [`ParseError`] (extraction-local): a QR payload or certificate text
//!   did not yield a usable field set. The document scanner treats this as a
//!   stage failure and moves on; direct QR intake surfaces it.
//!
//! * [`Rejection`] (admission): the store refused a well-formed record.
//!   Wrapped into [`ScanError::Rejected`] when it reaches a caller.
//!
//! `InvalidDate` never aborts anything: it drops a single field. "No QR on
//! this page" is `Option::None` from [`crate::pipeline::qr::QrLocator`] and
//! only becomes [`ScanError::QrNotFound`] on the direct image channel.

use crate::pipeline::document::Stage;
use thiserror::Error;

/// Every outcome of a scan that is reported back to the caller.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The payload was empty or otherwise unusable before any decoding.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uploaded document does not carry an accepted file extension.
    #[error("File '{filename}' is not accepted; expected one of: {accepted}")]
    UnsupportedExtension { filename: String, accepted: String },

    /// Uploaded document exceeds the configured size limit.
    #[error("Document is {size} bytes; the limit is {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },

    /// Corrupt or unsupported image / document encoding.
    #[error("Could not decode {what}: {detail}")]
    DecodeError { what: &'static str, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// An image decoded fine but carried no single readable QR symbol.
    #[error("No QR code found in image")]
    QrNotFound,

    /// A QR payload was read but carried no recognizable data.
    #[error("QR payload rejected: {0}")]
    Parse(#[from] ParseError),

    /// Every document stage ran and none produced a usable record.
    #[error("No QR code or usable certificate text found in {pages}-page document ({})", summarize(.attempts))]
    ExtractionFailed {
        pages: usize,
        attempts: Vec<(Stage, String)>,
    },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The record store refused the record.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    // ── Environment errors ────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Could not stage the document on disk.
    #[error("Failed to stage document for rendering: {0}")]
    Staging(#[source] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// True for outcomes that say "this certificate is already recorded".
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ScanError::Rejected(Rejection::DuplicateKey { .. }))
    }
}

fn summarize(attempts: &[(Stage, String)]) -> String {
    attempts
        .iter()
        .map(|(stage, why)| format!("{stage}: {why}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A non-fatal failure on a single document page.
///
/// The document scanner logs it and moves to the next page; it only
/// contributes to [`ScanError::ExtractionFailed`] when every page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page's text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },
}

/// Failure to turn raw QR text or certificate text into a field set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload contained zero recognizable keys.
    #[error("malformed payload: no recognizable keys in {len}-character payload")]
    MalformedPayload { len: usize },

    /// A date-like substring matched none of the accepted formats.
    #[error("unrecognized date '{0}'")]
    InvalidDate(String),

    /// Neither folio nor national identifier could be found.
    #[error("neither Folio nor CURP present")]
    MissingKeyFields,
}

/// Reasons the record store refuses a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// A stored record already carries this folio or national identifier.
    #[error("Duplicate certificate: {field} {value} is already recorded")]
    DuplicateKey { field: &'static str, value: String },

    /// The store holds its configured maximum of records.
    #[error("Store is full ({capacity} records)")]
    StoreFull { capacity: usize },

    /// The record has neither folio nor national identifier.
    #[error("Record has neither Folio nor CURP")]
    MissingKeyFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_display_names_the_key() {
        let e = ScanError::from(Rejection::DuplicateKey {
            field: "Folio",
            value: "123456".into(),
        });
        let msg = e.to_string();
        assert!(msg.contains("Folio 123456"), "got: {msg}");
        assert!(e.is_duplicate());
    }

    #[test]
    fn store_full_display() {
        let e = Rejection::StoreFull { capacity: 10 };
        assert!(e.to_string().contains("10 records"));
    }

    #[test]
    fn extraction_failed_lists_every_stage() {
        let e = ScanError::ExtractionFailed {
            pages: 2,
            attempts: vec![
                (Stage::QrPerPage, "no QR on 2 pages".into()),
                (Stage::TextFallback, "neither Folio nor CURP present".into()),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("2-page"), "got: {msg}");
        assert!(msg.contains("qr-per-page: no QR"), "got: {msg}");
        assert!(msg.contains("text-fallback: neither"), "got: {msg}");
        assert!(!e.is_duplicate());
    }

    #[test]
    fn malformed_payload_display() {
        let e = ParseError::MalformedPayload { len: 7 };
        assert!(e.to_string().contains("7-character"));
    }
}
