//! # acta-scan
//!
//! Digitize birth-certificate records from QR codes and certificate PDFs.
//!
//! A certificate reaches the system through one of three channels: text
//! typed by a hand QR scanner, a photo or upload of the QR, or the
//! certificate PDF itself. All three end in the same canonical
//! [`Record`], deduplicated by folio and CURP in a shared, concurrent
//! [`RecordStore`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate extension, size and %PDF magic; stage to a temp file
//!  ├─ 2. QR        render each page (pdfium) and look for exactly one QR symbol
//!  ├─ 3. Text      no usable QR: read every page's text layer instead
//!  ├─ 4. Extract   aliases / matchers → canonical fields, dates normalized
//!  └─ 5. Store     missing keys → capacity → duplicate, then append
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acta_scan::{Intake, ScanConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let intake = Intake::new(ScanConfig::default())?;
//!     let outcome = intake.scan_qr_text("Cadena: 0129000012345, CURP: PELJ900315HTLRPN09")?;
//!     eprintln!("stored {} via {}", outcome.key, outcome.provenance);
//!
//!     let pdf = std::fs::read("acta.pdf")?;
//!     intake.scan_document("acta.pdf", &pdf)?;
//!
//!     for record in intake.store().snapshot() {
//!         println!("{record}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `acta-scan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! acta-scan = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDFium
//!
//! Document scanning binds to a pdfium shared library at run time. Set
//! `PDFIUM_LIB_PATH` to the library file or its directory; otherwise the
//! working directory and the system library path are searched. QR text and
//! image intake never touch pdfium.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod intake;
pub mod pipeline;
pub mod record;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{PageError, ParseError, Rejection, ScanError};
pub use intake::{Intake, IntakeOutcome};
pub use pipeline::document::{DocumentScanner, Extraction, Stage};
pub use pipeline::extract::FieldExtractor;
pub use pipeline::qr::QrLocator;
pub use pipeline::render::PageSource;
pub use record::{DedupKey, Field, FieldValue, Provenance, Record, RecordFields};
pub use store::{Admission, RecordStore};
