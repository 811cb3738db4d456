//! QR code source art
//!
//! Renders the barcode that gets composited into a frame. The output always
//! declares `width`, `height` and `viewBox`, which is what the compositor
//! reads as the source's intrinsic size.

use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BarcodeError {
    #[error("Cannot encode payload as QR code: {0}")]
    Encode(#[from] QrError),

    #[error("Payload is empty")]
    EmptyPayload,
}

/// Render `data` as an SVG QR code at least `size` user units square.
///
/// Error correction is `M`, the usual default for printed codes that may pick
/// up smudges from the surrounding frame artwork.
pub fn render_qr_svg(data: &str, size: u32) -> Result<String, BarcodeError> {
    if data.is_empty() {
        return Err(BarcodeError::EmptyPayload);
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
    let svg = code
        .render::<svg::Color<'_>>()
        .min_dimensions(size, size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    tracing::debug!(requested = size, width = code.width(), "rendered qr code");
    Ok(svg)
}
