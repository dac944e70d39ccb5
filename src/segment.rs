//! Region segmentation over a line-art buffer.
//!
//! Labels enclosed areas with 4-connectivity, then merges undersized regions
//! into a neighbor across the separating line, smallest region first. The
//! merge works on a private label array owned by this module; callers only
//! ever see the finalized, renumbered map.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Line-art values above this are fillable interior; at or below is line.
const FOREGROUND_THRESHOLD: u8 = 127;

/// Chebyshev radius of the neighbor search when merging a small region.
/// A 7x7 square, large enough to jump across a typical thickened line.
const MERGE_REACH: i64 = 3;

/// One enclosed, colorable area of the picture.
///
/// `avg_color` and `color_index` are placeholders until the averaging and
/// palette stages fill them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: u32,
    pub pixel_count: u32,
    pub avg_color: [u8; 3],
    pub color_index: usize,
}

/// Finalized label map plus the region descriptors derived from it.
///
/// Labels are row-major, 0 for line pixels, 1..=N for regions with no gaps.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<u32>,
    pub regions: Vec<Region>,
}

/// Segment the line art into regions, absorbing regions smaller than
/// `min_region_size` into a larger neighbor where one is reachable.
pub fn segment_regions(lineart: &GrayImage, min_region_size: u32) -> Segmentation {
    let (width, height) = lineart.dimensions();

    let foreground = GrayImage::from_fn(width, height, |x, y| {
        if lineart.get_pixel(x, y)[0] > FOREGROUND_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let component_map = connected_components(&foreground, Connectivity::Four, Luma([0]));
    let mut labels: Vec<u32> = component_map.pixels().map(|p| p[0]).collect();

    merge_small_regions(&mut labels, width, height, min_region_size);
    let region_count = renumber_labels(&mut labels);

    let mut counts = vec![0u32; region_count as usize + 1];
    for &label in &labels {
        counts[label as usize] += 1;
    }

    let regions = (1..=region_count)
        .map(|id| Region {
            id,
            pixel_count: counts[id as usize],
            avg_color: [128, 128, 128],
            color_index: 0,
        })
        .collect();

    Segmentation {
        width,
        height,
        labels,
        regions,
    }
}

/// Render the label map as an 8-bit single-channel image.
///
/// Labels are taken modulo 256, so pictures with more than 255 surviving
/// regions alias in this visual encoding; the `Region` records themselves
/// stay distinct.
pub fn mask_image(segmentation: &Segmentation) -> GrayImage {
    let width = segmentation.width;
    GrayImage::from_fn(width, segmentation.height, |x, y| {
        let label = segmentation.labels[(y * width + x) as usize];
        Luma([(label % 256) as u8])
    })
}

/// Merge regions below `min_size` into a neighbor, smallest first.
///
/// For each undersized region the binary mask is effectively dilated by
/// `MERGE_REACH` and the labels newly covered (excluding line pixels and the
/// region itself) become candidates; the candidate with the largest currently
/// tracked size wins, ties going to the smallest label. A region fully walled
/// in by lines with no reachable neighbor stays unmerged, however small.
fn merge_small_regions(labels: &mut [u32], width: u32, height: u32, min_size: u32) {
    let max_label = labels.iter().copied().max().unwrap_or(0);
    if max_label == 0 {
        return;
    }

    let mut sizes = vec![0u32; max_label as usize + 1];
    for &label in labels.iter() {
        sizes[label as usize] += 1;
    }

    let mut small: Vec<(u32, u32)> = (1..=max_label)
        .filter(|&id| sizes[id as usize] > 0 && sizes[id as usize] < min_size)
        .map(|id| (id, sizes[id as usize]))
        .collect();
    small.sort_by_key(|&(id, size)| (size, id));

    let w = width as i64;
    let h = height as i64;

    for (small_id, _) in small {
        // Already absorbed into an earlier winner.
        if sizes[small_id as usize] == 0 {
            continue;
        }

        // Membership is read from the live array: an earlier merge may have
        // grown this region beyond its original pixels.
        let members: Vec<usize> = (0..labels.len())
            .filter(|&i| labels[i] == small_id)
            .collect();

        let mut candidates = BTreeSet::new();
        for &idx in &members {
            let x = (idx as i64) % w;
            let y = (idx as i64) / w;
            for dy in -MERGE_REACH..=MERGE_REACH {
                for dx in -MERGE_REACH..=MERGE_REACH {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || nx >= w || ny < 0 || ny >= h {
                        continue;
                    }
                    let neighbor = labels[(ny * w + nx) as usize];
                    if neighbor != 0 && neighbor != small_id {
                        candidates.insert(neighbor);
                    }
                }
            }
        }

        // Ascending iteration makes the first strict maximum the smallest
        // label among ties.
        let mut winner = None;
        let mut winner_size = 0u32;
        for candidate in candidates {
            let size = sizes[candidate as usize];
            if size > winner_size {
                winner_size = size;
                winner = Some(candidate);
            }
        }

        let Some(winner) = winner else {
            continue;
        };

        for idx in members {
            labels[idx] = winner;
        }
        sizes[winner as usize] += sizes[small_id as usize];
        sizes[small_id as usize] = 0;
    }
}

/// Remap surviving labels to contiguous 1..=N in ascending old-label order.
/// Returns N. Label 0 is preserved for line pixels.
fn renumber_labels(labels: &mut [u32]) -> u32 {
    let survivors: BTreeSet<u32> = labels.iter().copied().filter(|&l| l != 0).collect();

    let max_label = survivors.iter().next_back().copied().unwrap_or(0);
    let mut remap = vec![0u32; max_label as usize + 1];
    for (new, &old) in survivors.iter().enumerate() {
        remap[old as usize] = new as u32 + 1;
    }

    for label in labels.iter_mut() {
        *label = remap[*label as usize];
    }
    survivors.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Line art that is all background except 0-valued line pixels where
    /// `is_line` says so.
    fn lineart_from(width: u32, height: u32, is_line: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if is_line(x, y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    fn on_ring(x: u32, y: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
        x >= x0 && x <= x1 && y >= y0 && y <= y1 && (x == x0 || x == x1 || y == y0 || y == y1)
    }

    fn assert_label_invariants(seg: &Segmentation) {
        let n = seg.regions.len() as u32;
        let distinct: BTreeSet<u32> = seg.labels.iter().copied().filter(|&l| l != 0).collect();
        assert_eq!(distinct, (1..=n).collect::<BTreeSet<u32>>());

        let edge_pixels = seg.labels.iter().filter(|&&l| l == 0).count() as u32;
        let region_pixels: u32 = seg.regions.iter().map(|r| r.pixel_count).sum();
        assert_eq!(edge_pixels + region_pixels, seg.width * seg.height);
    }

    #[test]
    fn small_square_merges_into_canvas() {
        // An 80x80 interior and a 3x3 interior, each behind a 1px border,
        // on a 100x100 canvas.
        let lineart = lineart_from(100, 100, |x, y| {
            on_ring(x, y, 5, 5, 86, 86) || on_ring(x, y, 90, 90, 94, 94)
        });

        let seg = segment_regions(&lineart, 100);
        assert_label_invariants(&seg);

        // Canvas, big interior; the 9-pixel interior was absorbed.
        assert_eq!(seg.regions.len(), 2);
        assert!(seg.regions.iter().all(|r| r.pixel_count >= 100));
        assert!(seg.regions.iter().any(|r| r.pixel_count == 80 * 80));
    }

    #[test]
    fn isolated_region_survives_unmerged() {
        // A single fillable pixel in the middle of a 9x9 block of line
        // pixels: the neighbor search cannot reach past the wall.
        let lineart = lineart_from(40, 40, |x, y| {
            (10..=18).contains(&x) && (10..=18).contains(&y) && !(x == 14 && y == 14)
        });

        let seg = segment_regions(&lineart, 100);
        assert_label_invariants(&seg);

        assert_eq!(seg.regions.len(), 2);
        assert!(seg.regions.iter().any(|r| r.pixel_count == 1));
    }

    #[test]
    fn equal_size_neighbors_tie_breaks_to_smallest_label() {
        // Three vertical strips split by 1px lines: 12 columns, 3 columns,
        // 12 columns. The middle strip is undersized and both neighbors
        // track the same size, so the first-labeled (leftmost) one wins.
        let lineart = lineart_from(29, 9, |x, _| x == 12 || x == 16);

        let seg = segment_regions(&lineart, 100);
        assert_label_invariants(&seg);

        assert_eq!(seg.regions.len(), 2);
        assert_eq!(seg.regions[0].pixel_count, 12 * 9 + 3 * 9);
        assert_eq!(seg.regions[1].pixel_count, 12 * 9);
    }

    #[test]
    fn all_background_is_one_region() {
        let lineart = lineart_from(50, 20, |_, _| false);

        let seg = segment_regions(&lineart, 100);
        assert_label_invariants(&seg);
        assert_eq!(seg.regions.len(), 1);
        assert_eq!(seg.regions[0].pixel_count, 50 * 20);
    }

    #[test]
    fn all_lines_yields_no_regions() {
        let lineart = lineart_from(16, 16, |_, _| true);

        let seg = segment_regions(&lineart, 100);
        assert!(seg.regions.is_empty());
        assert!(seg.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn segmentation_is_deterministic() {
        let lineart = lineart_from(60, 60, |x, y| x % 13 == 0 || y % 11 == 0);

        let first = segment_regions(&lineart, 100);
        let second = segment_regions(&lineart, 100);
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.regions, second.regions);
    }

    #[test]
    fn mask_image_wraps_labels_modulo_256() {
        let seg = Segmentation {
            width: 5,
            height: 1,
            labels: vec![0, 1, 255, 256, 257],
            regions: Vec::new(),
        };

        let mask = mask_image(&seg);
        let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 1, 255, 0, 1]);
    }
}
