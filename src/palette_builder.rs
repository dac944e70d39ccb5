//! Palette generation by clustering region colors in Lab space.
//!
//! Region averages are clustered with a seeded Lloyd's k-means so identical
//! input produces bit-identical palettes: fixed seed per restart, fixed
//! restart and iteration counts, strict-inequality argmin so ties resolve to
//! the lowest index, and the best restart chosen by lowest inertia.

use crate::segment::Region;
use palette::{white_point::D65, FromColor, Lab, Srgb};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const KMEANS_SEED: u64 = 42;
const KMEANS_RESTARTS: u64 = 10;
const KMEANS_MAX_ITERATIONS: usize = 300;

/// One representative color of the final palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub index: usize,
    pub hex: String,
    pub rgb: [u8; 3],
}

/// Cluster the regions' average colors into at most `max_colors`
/// representatives and point each region's `color_index` at its cluster.
///
/// Zero regions (or a zero budget) short-circuits to an empty palette
/// without invoking the clustering at all.
pub fn build_palette(regions: &mut [Region], max_colors: usize) -> Vec<PaletteEntry> {
    let k = max_colors.min(regions.len());
    if k == 0 {
        return Vec::new();
    }

    let points: Vec<Lab<D65, f32>> = regions.iter().map(|r| rgb_to_lab(r.avg_color)).collect();

    // Strict inequality keeps the earliest restart on inertia ties.
    let mut best = lloyd(&points, k, KMEANS_SEED);
    for restart in 1..KMEANS_RESTARTS {
        let run = lloyd(&points, k, KMEANS_SEED.wrapping_add(restart));
        if run.inertia < best.inertia {
            best = run;
        }
    }

    for (region, &cluster) in regions.iter_mut().zip(best.assignments.iter()) {
        region.color_index = cluster;
    }

    best.centroids
        .iter()
        .enumerate()
        .map(|(index, &lab)| {
            let rgb = lab_to_rgb(lab);
            PaletteEntry {
                index,
                hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
                rgb,
            }
        })
        .collect()
}

struct KMeansRun {
    centroids: Vec<Lab<D65, f32>>,
    assignments: Vec<usize>,
    inertia: f64,
}

/// One seeded Lloyd's run: deterministic initialization, assignment, update.
fn lloyd(points: &[Lab<D65, f32>], k: usize, seed: u64) -> KMeansRun {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<Lab<D65, f32>> = rand::seq::index::sample(&mut rng, points.len(), k)
        .into_vec()
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignments = vec![0usize; points.len()];

    for iteration in 0..KMEANS_MAX_ITERATIONS {
        let new_assignments: Vec<usize> = points
            .par_iter()
            .map(|point| nearest_centroid(*point, &centroids))
            .collect();

        let converged = iteration > 0 && new_assignments == assignments;
        assignments = new_assignments;
        if converged {
            break;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0u64; k];
        for (point, &cluster) in points.iter().zip(assignments.iter()) {
            sums[cluster][0] += point.l as f64;
            sums[cluster][1] += point.a as f64;
            sums[cluster][2] += point.b as f64;
            counts[cluster] += 1;
        }
        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            // An empty cluster keeps its previous centroid.
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                *centroid = Lab::new(
                    (sums[cluster][0] / n) as f32,
                    (sums[cluster][1] / n) as f32,
                    (sums[cluster][2] / n) as f32,
                );
            }
        }
    }

    let inertia = points
        .iter()
        .zip(assignments.iter())
        .map(|(point, &cluster)| distance_squared(*point, centroids[cluster]) as f64)
        .sum();

    KMeansRun {
        centroids,
        assignments,
        inertia,
    }
}

fn nearest_centroid(point: Lab<D65, f32>, centroids: &[Lab<D65, f32>]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (i, &centroid) in centroids.iter().enumerate() {
        let dist = distance_squared(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

fn distance_squared(a: Lab<D65, f32>, b: Lab<D65, f32>) -> f32 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    dl * dl + da * da + db * db
}

fn rgb_to_lab(rgb: [u8; 3]) -> Lab<D65, f32> {
    let srgb = Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    );
    Lab::from_color(srgb)
}

fn lab_to_rgb(lab: Lab<D65, f32>) -> [u8; 3] {
    let srgb = Srgb::from_color(lab);
    [
        (srgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (srgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (srgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_with_color(id: u32, avg_color: [u8; 3]) -> Region {
        Region {
            id,
            pixel_count: 100,
            avg_color,
            color_index: 0,
        }
    }

    fn sample_regions() -> Vec<Region> {
        (0..12)
            .map(|i| {
                region_with_color(
                    i + 1,
                    [(i * 21 % 256) as u8, (255 - i * 17 % 256) as u8, (i * 55 % 256) as u8],
                )
            })
            .collect()
    }

    #[test]
    fn zero_regions_produce_empty_palette() {
        let mut regions: Vec<Region> = Vec::new();
        assert!(build_palette(&mut regions, 30).is_empty());
    }

    #[test]
    fn palette_size_clamps_to_region_count() {
        let mut regions = sample_regions();
        let palette = build_palette(&mut regions, 30);
        assert_eq!(palette.len(), regions.len());

        let mut regions = sample_regions();
        let palette = build_palette(&mut regions, 4);
        assert_eq!(palette.len(), 4);
    }

    #[test]
    fn every_color_index_is_a_valid_palette_index() {
        let mut regions = sample_regions();
        let palette = build_palette(&mut regions, 5);
        for region in &regions {
            assert!(region.color_index < palette.len());
        }
        for (i, entry) in palette.iter().enumerate() {
            assert_eq!(entry.index, i);
        }
    }

    #[test]
    fn clustering_is_deterministic_across_runs() {
        let mut first = sample_regions();
        let mut second = sample_regions();

        let palette_a = build_palette(&mut first, 6);
        let palette_b = build_palette(&mut second, 6);

        assert_eq!(palette_a, palette_b);
        assert_eq!(first, second);
    }

    #[test]
    fn single_color_input_recovers_that_color() {
        let mut regions = vec![region_with_color(1, [200, 50, 50])];
        let palette = build_palette(&mut regions, 30);

        assert_eq!(palette.len(), 1);
        assert_eq!(regions[0].color_index, 0);
        let rgb = palette[0].rgb;
        // Lab round trip may shift a channel by one.
        assert!((rgb[0] as i32 - 200).abs() <= 2, "{rgb:?}");
        assert!((rgb[1] as i32 - 50).abs() <= 2, "{rgb:?}");
        assert!((rgb[2] as i32 - 50).abs() <= 2, "{rgb:?}");
    }

    #[test]
    fn hex_matches_rgb_and_is_lowercase() {
        let mut regions = sample_regions();
        let palette = build_palette(&mut regions, 8);
        for entry in &palette {
            let expected = format!("#{:02x}{:02x}{:02x}", entry.rgb[0], entry.rgb[1], entry.rgb[2]);
            assert_eq!(entry.hex, expected);
            assert_eq!(entry.hex, entry.hex.to_lowercase());
        }
    }
}
