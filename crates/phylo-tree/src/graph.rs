//! Similarity matrix and the temporally constrained distance graph.

use phylo_core::config::PhylogenySettings;

/// Dense symmetric `n x n` matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy> SquareMatrix<T> {
    pub fn filled(n: usize, value: T) -> Self {
        Self { n, data: vec![value; n * n] }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.n + j]
    }

    fn set_symmetric(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.n + j] = value;
        self.data[j * self.n + i] = value;
    }
}

/// Pairwise cosine similarity of pre-normalized embeddings (plain dot
/// product). The diagonal is exactly 1.
pub fn similarity_matrix<E: AsRef<[f32]>>(embeddings: &[E]) -> SquareMatrix<f32> {
    let n = embeddings.len();
    let mut sim = SquareMatrix::filled(n, 0.0f32);
    for i in 0..n {
        sim.set_symmetric(i, i, 1.0);
        let a = embeddings[i].as_ref();
        for j in (i + 1)..n {
            let b = embeddings[j].as_ref();
            let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
            sim.set_symmetric(i, j, dot as f32);
        }
    }
    sim
}

/// Weight of the edge between two items, or `None` when they are neither
/// temporally close nor highly similar.
pub fn edge_weight(similarity: f32, time_diff_secs: i64, settings: &PhylogenySettings) -> Option<f64> {
    let dt = time_diff_secs.unsigned_abs();
    let close = dt < settings.temporal_threshold_secs.unsigned_abs();
    let similar = similarity > settings.similarity_threshold;
    if !(close || similar) {
        return None;
    }
    let ratio = dt as f64 / settings.temporal_threshold_secs as f64;
    Some(1.0 - f64::from(similarity) + ratio * settings.temporal_penalty)
}

/// All pairwise edges; `None` entries are missing edges (infinite distance).
pub fn constrained_distances(
    similarity: &SquareMatrix<f32>,
    timestamps: &[i64],
    settings: &PhylogenySettings,
) -> SquareMatrix<Option<f64>> {
    let n = timestamps.len();
    let mut dist = SquareMatrix::filled(n, None);
    for i in 0..n {
        for j in (i + 1)..n {
            let w = edge_weight(similarity.get(i, j), timestamps[i] - timestamps[j], settings);
            dist.set_symmetric(i, j, w);
        }
    }
    dist
}
