//! Fuzzy simplicial set construction from a k-NN graph.
//!
//! Each point gets a local distance scale so that its neighborhood carries a
//! fixed total membership (log2 k); directed memberships are then merged with
//! a fuzzy union into a symmetric weighted edge list.

use std::collections::BTreeMap;

use crate::knn::KnnGraph;

const SMOOTH_K_TOLERANCE: f32 = 1e-5;
const MIN_K_DIST_SCALE: f32 = 1e-3;
const BINARY_SEARCH_STEPS: usize = 64;

/// Per-point calibration: `rho` is the distance to the nearest distinct
/// neighbor, `sigma` the bandwidth found by binary search.
#[derive(Debug, Clone)]
pub struct LocalScales {
    pub sigmas: Vec<f32>,
    pub rhos: Vec<f32>,
}

pub fn smooth_knn_dist(knn: &KnnGraph, n_neighbors: usize) -> LocalScales {
    let target = (n_neighbors as f32).log2();
    let all: Vec<f32> = knn.distances.iter().flatten().copied().collect();
    let mean_distances = if all.is_empty() { 0.0 } else { all.iter().sum::<f32>() / all.len() as f32 };

    let mut sigmas = Vec::with_capacity(knn.len());
    let mut rhos = Vec::with_capacity(knn.len());
    for row in &knn.distances {
        let rho = row.iter().copied().find(|d| *d > 0.0).unwrap_or(0.0);

        let (mut lo, mut hi, mut mid) = (0.0f32, f32::INFINITY, 1.0f32);
        for _ in 0..BINARY_SEARCH_STEPS {
            let psum: f32 = row
                .iter()
                .skip(1)
                .map(|d| {
                    let d = d - rho;
                    if d > 0.0 { (-d / mid).exp() } else { 1.0 }
                })
                .sum();
            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
            }
        }

        let floor = if rho > 0.0 {
            MIN_K_DIST_SCALE * (row.iter().sum::<f32>() / row.len() as f32)
        } else {
            MIN_K_DIST_SCALE * mean_distances
        };
        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }
    LocalScales { sigmas, rhos }
}

/// Symmetric membership graph as `(head, tail, weight)` triples, both
/// directions present, sorted by `(head, tail)`.
pub fn fuzzy_simplicial_set(knn: &KnnGraph, n_neighbors: usize) -> Vec<(usize, usize, f32)> {
    let scales = smooth_knn_dist(knn, n_neighbors);

    let mut directed: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (i, (idx_row, dist_row)) in knn.indices.iter().zip(knn.distances.iter()).enumerate() {
        for (&j, &d) in idx_row.iter().zip(dist_row.iter()) {
            if j == i {
                continue;
            }
            let (rho, sigma) = (scales.rhos[i], scales.sigmas[i]);
            let w = if d - rho <= 0.0 || sigma == 0.0 { 1.0 } else { (-(d - rho) / sigma).exp() };
            directed.insert((i, j), w);
        }
    }

    let mut symmetric: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (&(i, j), &w_ij) in &directed {
        let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let union = w_ij + w_ji - w_ij * w_ji;
        if union > 0.0 {
            symmetric.insert((i, j), union);
            symmetric.insert((j, i), union);
        }
    }
    symmetric.into_iter().map(|((i, j), w)| (i, j, w)).collect()
}
