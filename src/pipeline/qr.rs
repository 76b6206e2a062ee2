//! QR location and decoding on a single raster image.
//!
//! The image is reduced to 8-bit luma and handed to `rqrr`, which finds
//! candidate grids and decodes them. A page must carry exactly one symbol:
//! zero or several located symbols is reported as "not found" rather than
//! guessing which one belongs to the certificate.

use crate::error::ScanError;
use crate::pipeline::input::decode_base64;
use image::DynamicImage;
use tracing::{debug, info, warn};

/// Stateless QR locator. Cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrLocator;

impl QrLocator {
    pub fn new() -> Self {
        Self
    }

    /// Locate and decode exactly one QR symbol in `image`.
    ///
    /// Returns `None` when no symbol is readable or when more than one
    /// symbol is located, whether or not the others decode or carry the
    /// same payload. Both are expected outcomes, not errors.
    pub fn decode_image(&self, image: &DynamicImage) -> Option<String> {
        let luma = image.to_luma8();
        let (w, h) = luma.dimensions();
        if w == 0 || h == 0 {
            warn!("Empty image passed to QR locator");
            return None;
        }
        debug!("Scanning {}x{} image for QR symbols", w, h);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            w as usize,
            h as usize,
            |x, y| luma.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();

        let grid = match grids.as_slice() {
            [] => {
                debug!("No QR symbol located");
                return None;
            }
            [grid] => grid,
            many => {
                warn!("{} QR symbols on one image; treating as no match", many.len());
                return None;
            }
        };

        match grid.decode() {
            Ok((_meta, content)) => {
                let content = content.trim();
                if content.is_empty() {
                    debug!("QR symbol decoded to an empty payload");
                    return None;
                }
                info!("QR decoded ({} chars)", content.chars().count());
                Some(content.to_string())
            }
            Err(e) => {
                debug!("QR symbol located but did not decode: {:?}", e);
                None
            }
        }
    }

    /// Decode a compressed image (PNG, JPEG) and look for a QR symbol.
    ///
    /// # Errors
    /// [`ScanError::DecodeError`] when the bytes are empty or not a supported
    /// image encoding. A valid image without a symbol is `Ok(None)`.
    pub fn decode_encoded(&self, bytes: &[u8]) -> Result<Option<String>, ScanError> {
        if bytes.is_empty() {
            return Err(ScanError::DecodeError {
                what: "image",
                detail: "no image data".into(),
            });
        }
        let image = image::load_from_memory(bytes).map_err(|e| ScanError::DecodeError {
            what: "image",
            detail: e.to_string(),
        })?;
        debug!("Image decoded: {}x{}", image.width(), image.height());
        Ok(self.decode_image(&image))
    }

    /// Same as [`decode_encoded`](Self::decode_encoded) for base64 text,
    /// with or without a `data:image/...;base64,` prefix.
    pub fn decode_base64(&self, data: &str) -> Result<Option<String>, ScanError> {
        let bytes = decode_base64(data)?;
        self.decode_encoded(&bytes)
    }
}
