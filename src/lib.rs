//! Coloring-book pipeline.
//!
//! Turns a photograph into a coloring-book artifact: black-and-white line
//! art, a discrete region mask, and a bounded palette mapping every enclosed
//! region to a representative color. The serving layer (upload endpoint,
//! multipart parsing, the external line-art generation call) lives outside
//! this crate; it hands over raw image bytes and receives a structured
//! result ready for JSON serialization.

mod codec;
mod color_average;
mod error;
mod lineart;
mod palette_builder;
mod pipeline;
mod segment;

pub use error::{ColorbookError, Result};
pub use palette_builder::PaletteEntry;
pub use pipeline::{ExternalLineart, LineartSource, PictureInput, PipelineConfig, ProcessResult};
pub use segment::Region;

use std::time::Instant;

/// Process one uploaded picture through the full pipeline.
///
/// Runs line-art extraction, region segmentation with small-region
/// elimination, per-region color averaging, and palette clustering, then
/// re-encodes the outputs as base64 PNG data URIs.
///
/// # Arguments
/// * `input` - Caller-generated id, raw image bytes, and the external
///   line-art disposition
/// * `config` - Minimum region size, palette budget, and line-art source
///
/// # Returns
/// A [`ProcessResult`] matching the service's JSON contract; the only fatal
/// failure is an undecodable photograph.
pub fn process_picture(input: PictureInput, config: &PipelineConfig) -> Result<ProcessResult> {
    let start = Instant::now();
    log::info!(
        "Processing picture {}: {} bytes, min region {}, max colors {}",
        input.id,
        input.image_bytes.len(),
        config.min_region_size,
        config.max_palette_colors
    );

    let result = pipeline::process(input, config)?;

    log::info!(
        "Picture {} processed: {} regions, {} palette colors, {}ms",
        result.id,
        result.regions.len(),
        result.palette.len(),
        start.elapsed().as_millis()
    );

    Ok(result)
}
