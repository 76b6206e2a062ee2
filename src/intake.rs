//! Intake entry points: one per inbound channel.
//!
//! ```text
//! scanner text ─────────────────────────────▶ parse_qr ──┐
//! camera / uploaded image ──▶ QrLocator ────▶ parse_qr ──┼──▶ RecordStore::add
//! uploaded PDF ─────────────▶ DocumentScanner ───────────┘
//! ```
//!
//! Every entry point validates its untrusted payload first, then runs the
//! matching extraction and submits the result to the shared store. The
//! synchronous methods block on pdfium; async callers use the `_async`
//! variants, which move the work onto tokio's blocking pool.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::pipeline::document::DocumentScanner;
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::input;
use crate::pipeline::qr::QrLocator;
use crate::record::{Provenance, RecordFields};
use crate::store::{Admission, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What happened to one accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeOutcome {
    pub provenance: Provenance,
    /// Dedup key of the stored record.
    pub key: String,
    /// Records held after this insertion.
    pub total: usize,
    /// 1-based page carrying the QR, for `pdf-qr` outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl IntakeOutcome {
    fn new(admission: Admission, provenance: Provenance, page: Option<usize>) -> Self {
        Self {
            provenance,
            key: admission.key.to_string(),
            total: admission.total,
            page,
        }
    }
}

/// The scan pipeline wired to a record store.
///
/// Cheap to clone: clones share the same store.
#[derive(Debug, Clone)]
pub struct Intake {
    config: ScanConfig,
    extractor: FieldExtractor,
    locator: QrLocator,
    scanner: DocumentScanner,
    store: Arc<RecordStore>,
}

impl Intake {
    /// Build an intake with a fresh store sized by `config.capacity`.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let store = Arc::new(RecordStore::new(config.capacity));
        Self::with_store(config, store)
    }

    /// Build an intake that submits into an existing store.
    pub fn with_store(config: ScanConfig, store: Arc<RecordStore>) -> Result<Self, ScanError> {
        let extractor = FieldExtractor::new(&config)?;
        let scanner = DocumentScanner::new(&config, extractor.clone());
        debug!("Intake ready: {:?}", store);
        Ok(Self {
            config,
            extractor,
            locator: QrLocator::new(),
            scanner,
            store,
        })
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Submit raw text read by a hand scanner.
    pub fn scan_qr_text(&self, payload: &str) -> Result<IntakeOutcome, ScanError> {
        let payload = input::validate_qr_text(payload)?;
        let fields = self.extractor.parse_qr(payload)?;
        self.submit(fields, Provenance::QrScan, None)
    }

    /// Submit a camera capture or uploaded picture, base64-encoded.
    pub fn scan_image_base64(&self, data: &str) -> Result<IntakeOutcome, ScanError> {
        let bytes = input::decode_base64(data)?;
        self.scan_image_bytes(&bytes)
    }

    /// Submit a compressed image (PNG, JPEG).
    ///
    /// # Errors
    /// [`ScanError::QrNotFound`] when the image holds zero or several
    /// readable symbols.
    pub fn scan_image_bytes(&self, bytes: &[u8]) -> Result<IntakeOutcome, ScanError> {
        let payload = self
            .locator
            .decode_encoded(bytes)?
            .ok_or(ScanError::QrNotFound)?;
        let fields = self.extractor.parse_qr(&payload)?;
        self.submit(fields, Provenance::QrImage, None)
    }

    /// Submit an uploaded certificate PDF.
    pub fn scan_document(&self, filename: &str, bytes: &[u8]) -> Result<IntakeOutcome, ScanError> {
        input::validate_document(filename, bytes, &self.config)?;
        info!("Scanning document '{}'", filename);
        let extraction = self.scanner.process(bytes)?;
        self.submit(extraction.fields, extraction.provenance, extraction.page)
    }

    /// [`scan_document`](Self::scan_document) on tokio's blocking pool.
    pub async fn scan_document_async(
        &self,
        filename: String,
        bytes: Vec<u8>,
    ) -> Result<IntakeOutcome, ScanError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.scan_document(&filename, &bytes))
            .await
            .map_err(|e| ScanError::Internal(format!("spawn_blocking panicked: {}", e)))?
    }

    /// [`scan_image_bytes`](Self::scan_image_bytes) on tokio's blocking pool.
    pub async fn scan_image_async(&self, bytes: Vec<u8>) -> Result<IntakeOutcome, ScanError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.scan_image_bytes(&bytes))
            .await
            .map_err(|e| ScanError::Internal(format!("spawn_blocking panicked: {}", e)))?
    }

    fn submit(
        &self,
        fields: RecordFields,
        provenance: Provenance,
        page: Option<usize>,
    ) -> Result<IntakeOutcome, ScanError> {
        let admission = self.store.add(fields, provenance)?;
        Ok(IntakeOutcome::new(admission, provenance, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, Rejection};

    fn intake() -> Intake {
        Intake::new(ScanConfig::default()).unwrap()
    }

    #[test]
    fn qr_text_lands_in_store() {
        let intake = intake();
        let outcome = intake
            .scan_qr_text("Cadena: 998877, CURP: RUAA900315MDFZNN09, Nombre: ANA RUIZ")
            .unwrap();
        assert_eq!(outcome.provenance, Provenance::QrScan);
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.key, "Folio 998877");
        assert_eq!(intake.store().len(), 1);
    }

    #[test]
    fn resubmission_is_duplicate() {
        let intake = intake();
        let payload = "Cadena: 42, Nombre: ANA";
        intake.scan_qr_text(payload).unwrap();
        let err = intake.scan_qr_text(payload).unwrap_err();
        assert!(err.is_duplicate(), "{err}");
        assert_eq!(intake.store().len(), 1);
    }

    #[test]
    fn empty_and_unrecognized_payloads() {
        let intake = intake();
        assert!(matches!(
            intake.scan_qr_text("   "),
            Err(ScanError::InvalidInput(_))
        ));
        assert!(matches!(
            intake.scan_qr_text("hello world"),
            Err(ScanError::Parse(ParseError::MalformedPayload { .. }))
        ));
    }

    #[test]
    fn payload_without_keys_is_rejected_by_store() {
        let intake = intake();
        assert!(matches!(
            intake.scan_qr_text("Nombre: ANA RUIZ, Sexo: MUJER"),
            Err(ScanError::Rejected(Rejection::MissingKeyFields))
        ));
        assert!(intake.store().is_empty());
    }

    #[test]
    fn documents_validated_before_rendering() {
        let intake = intake();
        assert!(matches!(
            intake.scan_document("acta.png", b"%PDF-1.7"),
            Err(ScanError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            intake.scan_document("acta.pdf", b"GIF89a"),
            Err(ScanError::DecodeError { what: "document", .. })
        ));
    }

    #[test]
    fn clones_share_the_store() {
        let a = intake();
        let b = a.clone();
        a.scan_qr_text("Folio: 1, Nombre: X").unwrap();
        assert_eq!(b.store().len(), 1);
    }
}
