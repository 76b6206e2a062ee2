//! Pipeline stages for certificate extraction.
//!
//! Each submodule implements one step. Images and documents meet at
//! [`extract`], which turns whatever text was recovered into canonical
//! fields.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ qr ──▶ extract ◀── (scanner text)
//! (staging)  (pdfium)  (rqrr)   (aliases / matchers, dates)
//!               │                  ▲
//!               └──── text layer ──┘
//! ```
//!
//! 1. [`input`]    validate untrusted payloads; stage documents on disk
//! 2. [`render`]   rasterise pages and read text layers behind [`render::PageSource`]
//! 3. [`qr`]       locate and decode exactly one QR symbol per image
//! 4. [`extract`]  QR payload or certificate text to [`crate::record::RecordFields`]
//! 5. [`dates`]    normalize the date formats printed on certificates
//! 6. [`document`] the QR-per-page then text-fallback state machine

pub mod dates;
pub mod document;
pub mod extract;
pub mod input;
pub mod qr;
pub mod render;
