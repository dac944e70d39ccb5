//! Decode/encode boundary: compressed bytes in, base64 PNG data URIs out.
//!
//! The rest of the pipeline only ever sees decoded pixel buffers; this module
//! is the single place that touches compressed image bytes. Output images are
//! re-encoded as lossless PNG so the colored photograph round-trips
//! pixel-exact.

use crate::error::{ColorbookError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops, GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Decode compressed image bytes into an RGB buffer.
///
/// Any raster format the image crate understands is accepted; the alpha
/// channel, if present, is discarded. Failure is fatal to the request.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes).map_err(ColorbookError::Decode)?;
    Ok(decoded.to_rgb8())
}

/// Resize an RGB buffer to the given dimensions if it does not already match.
pub fn resize_to_match(img: RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, imageops::FilterType::Triangle)
    }
}

/// Losslessly encode an RGB buffer as a base64 PNG data URI.
pub fn png_data_uri_rgb(img: &RgbImage) -> Result<String> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ColorbookError::Encode)?;
    Ok(to_data_uri(&buf))
}

/// Encode a single-channel buffer as a base64 PNG data URI.
pub fn png_data_uri_gray(img: &GrayImage) -> Result<String> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ColorbookError::Encode)?;
    Ok(to_data_uri(&buf))
}

fn to_data_uri(png_bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png_bytes))
}

#[cfg(test)]
pub(crate) fn data_uri_to_bytes(uri: &str) -> Vec<u8> {
    let b64 = uri
        .strip_prefix(DATA_URI_PREFIX)
        .expect("data URI should carry the PNG prefix");
    STANDARD.decode(b64).expect("data URI payload should be valid base64")
}
