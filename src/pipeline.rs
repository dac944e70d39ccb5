//! Pipeline orchestration: one request in, one structured result out.
//!
//! Every invocation builds fresh buffers and discards them with the result;
//! there is no cross-request state, so independent requests can run
//! concurrently without locking.

use crate::codec;
use crate::color_average::average_region_colors;
use crate::error::Result;
use crate::lineart;
use crate::palette_builder::{build_palette, PaletteEntry};
use crate::segment::{mask_image, segment_regions, Region};
use serde::{Deserialize, Serialize};

/// Disposition of the external line-art collaborator, decided once at entry.
///
/// The serving layer either made no attempt, fetched a candidate image, or
/// tried and failed; a failure carries the collaborator's message through to
/// the response without affecting the pipeline itself.
#[derive(Debug, Clone)]
pub enum ExternalLineart {
    None,
    Candidate(Vec<u8>),
    Failed(String),
}

/// Which line art feeds segmentation.
///
/// `Generated` reproduces the original service's observable behavior: an
/// external candidate may be supplied but never influences segmentation.
/// `ExternalIfAvailable` makes the alternative path an explicit opt-in
/// instead of dead configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineartSource {
    Generated,
    ExternalIfAvailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub min_region_size: u32,
    pub max_palette_colors: usize,
    pub lineart_source: LineartSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_region_size: 100,
            max_palette_colors: 30,
            lineart_source: LineartSource::Generated,
        }
    }
}

/// One upload, as handed over by the serving layer.
///
/// `id` is an opaque caller-generated identifier, passed through unchanged.
#[derive(Debug, Clone)]
pub struct PictureInput {
    pub id: String,
    pub image_bytes: Vec<u8>,
    pub external_lineart: ExternalLineart,
}

/// Structured pipeline result; serializes to the service's JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub id: String,
    pub lineart_url: String,
    pub colored_url: String,
    pub mask_url: String,
    pub palette: Vec<PaletteEntry>,
    pub regions: Vec<Region>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlm_error: Option<String>,
}

/// Run the full pipeline on one picture.
///
/// Only a decode failure of the photograph is fatal. Degenerate inputs (flat
/// images, no enclosed regions) produce valid, if visually boring, results;
/// an unusable external candidate falls back to generated line art.
pub fn process(input: PictureInput, config: &PipelineConfig) -> Result<ProcessResult> {
    let photo = codec::decode_rgb(&input.image_bytes)?;
    let (width, height) = photo.dimensions();

    let (candidate, vlm_error) = match input.external_lineart {
        ExternalLineart::None => (None, None),
        ExternalLineart::Candidate(bytes) => (Some(bytes), None),
        ExternalLineart::Failed(message) => (None, Some(message)),
    };

    let lineart = match (config.lineart_source, candidate) {
        (LineartSource::ExternalIfAvailable, Some(bytes)) => match codec::decode_rgb(&bytes) {
            Ok(img) => lineart::normalize_external(img, width, height),
            Err(err) => {
                log::warn!(
                    "External line-art candidate for {} is undecodable ({}), falling back to generated",
                    input.id,
                    err
                );
                lineart::generate(&photo)
            }
        },
        _ => lineart::generate(&photo),
    };

    let mut segmentation = segment_regions(&lineart, config.min_region_size);
    average_region_colors(&segmentation.labels, &photo, &mut segmentation.regions);
    let palette = build_palette(&mut segmentation.regions, config.max_palette_colors);
    let mask = mask_image(&segmentation);

    Ok(ProcessResult {
        lineart_url: codec::png_data_uri_gray(&lineart)?,
        colored_url: codec::png_data_uri_rgb(&photo)?,
        mask_url: codec::png_data_uri_gray(&mask)?,
        palette,
        regions: segmentation.regions,
        vlm_error,
        id: input.id,
    })
}
