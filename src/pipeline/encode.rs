//! Image encoding: cropped regions → JPEG bytes, bytes → base64 payloads.
//!
//! Regions are stored as raw JPEG bytes and only base64-encoded when the
//! inliner embeds them, so callers that write regions to disk never pay for
//! the text encoding. JPEG has no alpha channel; crops are flattened to RGB
//! first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// MIME type of every extracted region.
pub const REGION_MIME: &str = "image/jpeg";

/// Encode a cropped region as JPEG at the given quality (1–100).
pub fn encode_region(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;

    debug!(
        "Encoded region {}x{} → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard (RFC 4648) base64 without line wrapping.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:image/jpeg;base64,<payload>` for an already-encoded payload.
pub fn jpeg_data_uri(base64_payload: &str) -> String {
    format!("data:{REGION_MIME};base64,{base64_payload}")
}
