//! Image encoding: `DynamicImage` → PNG → base64 data URI.
//!
//! The inference endpoint takes images inline as `data:image;base64,<...>`.
//! PNG keeps rendered text crisp; JPEG artefacts around glyphs hurt
//! recognition far more than the extra bytes cost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Prefix of every encoded page image.
pub const DATA_URI_PREFIX: &str = "data:image;base64,";

/// Encode a rasterised page as a base64 PNG data URI.
pub fn encode_page(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} page → {} bytes base64", img.width(), img.height(), b64.len());

    Ok(format!("{DATA_URI_PREFIX}{b64}"))
}
