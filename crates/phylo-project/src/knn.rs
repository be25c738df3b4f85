//! Exact nearest-neighbor search under cosine distance.

/// Cosine distance in `[0, 2]`. A zero vector is at distance 1 from anything
/// but another zero vector.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 && nb == 0.0 {
        return 0.0;
    }
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (na.sqrt() * nb.sqrt())).max(0.0) as f32
}

/// Per-point neighbor lists. Row `i` starts with `i` itself at distance 0,
/// followed by the nearest other points in ascending distance.
#[derive(Debug, Clone)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f32>>,
}

impl KnnGraph {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Brute-force k-NN; `k` counts the point itself and is clamped to `n`.
pub fn exact_knn<E: AsRef<[f32]>>(data: &[E], k: usize) -> KnnGraph {
    let n = data.len();
    let k = k.clamp(1, n.max(1));
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);
    for i in 0..n {
        let mut others: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, cosine_distance(data[i].as_ref(), data[j].as_ref())))
            .collect();
        others.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        others.truncate(k - 1);

        let mut row_idx = Vec::with_capacity(k);
        let mut row_dist = Vec::with_capacity(k);
        row_idx.push(i);
        row_dist.push(0.0);
        for (j, d) in others {
            row_idx.push(j);
            row_dist.push(d);
        }
        indices.push(row_idx);
        distances.push(row_dist);
    }
    KnnGraph { indices, distances }
}
