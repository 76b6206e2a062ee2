//! Input validation and staging for untrusted scan payloads.
//!
//! Every inbound payload is checked before it reaches a decoder: scanner
//! text must be non-empty, images must be valid base64, documents must
//! carry an accepted extension, fit the size limit and start with the
//! `%PDF` magic bytes.
//!
//! pdfium opens documents from a file-system path, so an uploaded document
//! is written to a [`StagedDocument`]. The file is deleted when the staging
//! value is dropped, on every exit path including errors and panics.

use crate::config::ScanConfig;
use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A document written to a private temporary file for the renderer.
pub struct StagedDocument {
    file: NamedTempFile,
}

impl StagedDocument {
    /// Write `bytes` to a fresh temporary `.pdf` file.
    pub fn stage(bytes: &[u8]) -> Result<Self, ScanError> {
        let mut file = tempfile::Builder::new()
            .prefix("acta-")
            .suffix(".pdf")
            .tempfile()
            .map_err(ScanError::Staging)?;
        file.write_all(bytes).map_err(ScanError::Staging)?;
        file.flush().map_err(ScanError::Staging)?;
        debug!("Document staged at {} ({} bytes)", file.path().display(), bytes.len());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Validate raw scanner text and return it trimmed.
pub fn validate_qr_text(payload: &str) -> Result<&str, ScanError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidInput("QR payload is empty".into()));
    }
    Ok(trimmed)
}

/// Decode base64 image data, stripping any `data:...;base64,` prefix.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, ScanError> {
    let body = match data.split_once("base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    let body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if body.is_empty() {
        return Err(ScanError::DecodeError {
            what: "base64",
            detail: "no image data".into(),
        });
    }
    STANDARD.decode(body).map_err(|e| ScanError::DecodeError {
        what: "base64",
        detail: e.to_string(),
    })
}

/// Check an uploaded document against the configured limits.
pub fn validate_document(
    filename: &str,
    bytes: &[u8],
    config: &ScanConfig,
) -> Result<(), ScanError> {
    if !config.accepts_filename(filename) {
        return Err(ScanError::UnsupportedExtension {
            filename: filename.to_string(),
            accepted: config.accepted_extensions.join(", "),
        });
    }
    if bytes.is_empty() {
        return Err(ScanError::InvalidInput(format!("'{filename}' is empty")));
    }
    if bytes.len() > config.max_document_bytes {
        return Err(ScanError::DocumentTooLarge {
            size: bytes.len(),
            limit: config.max_document_bytes,
        });
    }
    if !bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ScanError::DecodeError {
            what: "document",
            detail: format!("'{filename}' is not a PDF (first bytes: {magic:?})"),
        });
    }
    Ok(())
}
