//! Line-art extraction from a photograph.
//!
//! Produces a single-channel buffer where lines are 0 and fillable interior
//! is 255. The stage ordering is load-bearing: denoise before gradients so
//! sensor noise does not produce micro-edges, close before dilate so small
//! contour gaps are bridged into loops, dilate before invert so adjacent
//! regions do not leak into each other during labeling.

use crate::codec;
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::bilateral_filter;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use rayon::prelude::*;

/// Bilateral filter window, matched to the denoise pass of the edge detector.
const BILATERAL_WINDOW: u32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPATIAL: f32 = 75.0;

/// Externally generated candidates are near-binary already; a fixed cutoff
/// keeps anti-aliased stroke fringes out of the line mask.
const EXTERNAL_LINE_THRESHOLD: u8 = 200;

/// Derive black-line/white-background line art from the photograph.
///
/// A perfectly flat image has no gradient to normalize against; that case
/// returns an all-background buffer, which downstream segmentation handles
/// as a single region.
pub fn generate(photo: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(photo);
    let denoised = bilateral_filter(
        &gray,
        BILATERAL_WINDOW,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPATIAL,
    );

    let (width, height) = denoised.dimensions();
    let gx = horizontal_sobel(&denoised);
    let gy = vertical_sobel(&denoised);

    let magnitude: Vec<f32> = (0..(width as usize * height as usize))
        .into_par_iter()
        .map(|i| {
            let x = (i as u32) % width;
            let y = (i as u32) / width;
            let dx = gx.get_pixel(x, y)[0] as f32;
            let dy = gy.get_pixel(x, y)[0] as f32;
            (dx * dx + dy * dy).sqrt()
        })
        .collect();

    let max = magnitude.iter().cloned().fold(0.0f32, f32::max);
    if max == 0.0 {
        // Zero-variance image: no edges anywhere, everything is fillable.
        return GrayImage::from_pixel(width, height, Luma([255]));
    }

    let gradient = GrayImage::from_fn(width, height, |x, y| {
        let m = magnitude[(y * width + x) as usize];
        Luma([(m / max * 255.0) as u8])
    });

    let level = otsu_level(&gradient);
    let edges = GrayImage::from_fn(width, height, |x, y| {
        if gradient.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let closed = close(&edges, Norm::LInf, 1);
    let thickened = dilate_2x2(&closed);

    GrayImage::from_fn(width, height, |x, y| {
        Luma([255 - thickened.get_pixel(x, y)[0]])
    })
}

/// Normalize an externally generated line-art candidate for segmentation.
///
/// The candidate arrives as an arbitrary-size RGB rendering with dark lines
/// on a light background, so its orientation already matches the generated
/// line art and no inversion is applied. Resizing happens before any
/// pixel-level use so the label map lines up with the photograph.
pub fn normalize_external(candidate: RgbImage, width: u32, height: u32) -> GrayImage {
    let resized = codec::resize_to_match(candidate, width, height);
    let gray = imageops::grayscale(&resized);

    let binary = GrayImage::from_fn(width, height, |x, y| {
        if gray.get_pixel(x, y)[0] > EXTERNAL_LINE_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let closed = close(&binary, Norm::LInf, 1);
    open_2x2(&closed)
}

/// 2x2 dilation with the anchor at the top-left element.
///
/// imageproc's norm-based morphology only offers odd-sized structuring
/// elements, and the even kernel matters here: it thickens each line by a
/// single pixel instead of two.
fn dilate_2x2(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut v = 0u8;
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                if x >= dx && y >= dy {
                    v = v.max(img.get_pixel(x - dx, y - dy)[0]);
                }
            }
        }
        Luma([v])
    })
}

/// 2x2 erosion; out-of-bounds neighbors count as foreground so the image
/// border does not erode.
fn erode_2x2(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut v = 255u8;
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                if x >= dx && y >= dy {
                    v = v.min(img.get_pixel(x - dx, y - dy)[0]);
                }
            }
        }
        Luma([v])
    })
}

fn open_2x2(img: &GrayImage) -> GrayImage {
    dilate_2x2(&erode_2x2(img))
}
