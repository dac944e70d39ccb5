//! Per-region mean color, computed from the original photograph.

use crate::segment::Region;
use image::RgbImage;

/// Fallback for a region whose pixel set turns out empty.
const SENTINEL_GRAY: [u8; 3] = [128, 128, 128];

/// Fill in each region's `avg_color` with the truncated integer mean of the
/// photo pixels carrying that label.
///
/// Pure function of the label map and the photo; the full-resolution labels
/// are used, not the 8-bit mask rendering, so pictures with more than 255
/// regions still average correctly.
pub fn average_region_colors(labels: &[u32], photo: &RgbImage, regions: &mut [Region]) {
    let n = regions.iter().map(|r| r.id).max().unwrap_or(0) as usize;
    let mut sums = vec![[0u64; 3]; n + 1];
    let mut counts = vec![0u64; n + 1];

    for (label, pixel) in labels.iter().zip(photo.pixels()) {
        let label = *label as usize;
        if label == 0 || label > n {
            continue;
        }
        sums[label][0] += pixel[0] as u64;
        sums[label][1] += pixel[1] as u64;
        sums[label][2] += pixel[2] as u64;
        counts[label] += 1;
    }

    for region in regions.iter_mut() {
        let id = region.id as usize;
        region.avg_color = if counts[id] > 0 {
            [
                (sums[id][0] / counts[id]) as u8,
                (sums[id][1] / counts[id]) as u8,
                (sums[id][2] / counts[id]) as u8,
            ]
        } else {
            SENTINEL_GRAY
        };
    }
}
