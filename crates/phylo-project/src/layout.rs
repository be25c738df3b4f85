//! Low-dimensional layout: curve fitting and stochastic gradient descent.

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::Rng;

use phylo_core::types::Point2;

const CURVE_SAMPLES: usize = 300;
const GRADIENT_CLIP: f32 = 4.0;
const REPULSION_EPSILON: f32 = 0.001;

/// Fit `1 / (1 + a * x^(2b))` to the offset-exponential membership curve
/// defined by `spread` and `min_dist` (Levenberg-Marquardt on two parameters).
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let (spread, min_dist) = (f64::from(spread), f64::from(min_dist));
    let xs: Vec<f64> = (0..CURVE_SAMPLES)
        .map(|i| spread * 3.0 * i as f64 / (CURVE_SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let cost = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(ys.iter())
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut current = cost(a, b);
    let mut lambda = 1e-3;
    for _ in 0..200 {
        let (mut jtj, mut jtr) = ([[0.0f64; 2]; 2], [0.0f64; 2]);
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            if x <= 0.0 {
                continue;
            }
            let p = x.powf(2.0 * b);
            let denom = (1.0 + a * p) * (1.0 + a * p);
            let r = 1.0 / (1.0 + a * p) - y;
            let ja = -p / denom;
            let jb = -a * p * 2.0 * x.ln() / denom;
            jtj[0][0] += ja * ja;
            jtj[0][1] += ja * jb;
            jtj[1][1] += jb * jb;
            jtr[0] += ja * r;
            jtr[1] += jb * r;
        }
        jtj[1][0] = jtj[0][1];

        let m00 = jtj[0][0] * (1.0 + lambda);
        let m11 = jtj[1][1] * (1.0 + lambda);
        let det = m00 * m11 - jtj[0][1] * jtj[1][0];
        if det.abs() < f64::EPSILON {
            break;
        }
        let da = -(m11 * jtr[0] - jtj[0][1] * jtr[1]) / det;
        let db = -(m00 * jtr[1] - jtj[1][0] * jtr[0]) / det;
        let (na, nb) = (a + da, b + db);
        if na > 0.0 && nb > 0.0 {
            let next = cost(na, nb);
            if next < current {
                a = na;
                b = nb;
                current = next;
                lambda = (lambda / 10.0).max(1e-12);
                if da.abs() < 1e-10 && db.abs() < 1e-10 {
                    break;
                }
                continue;
            }
        }
        lambda *= 10.0;
        if lambda > 1e12 {
            break;
        }
    }
    (a as f32, b as f32)
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    pub a: f32,
    pub b: f32,
    pub n_epochs: usize,
    pub learning_rate: f32,
    pub negative_sample_rate: usize,
}

/// Sampling period of each edge in epochs; heavier edges are sampled more often.
/// Edges lighter than `max / n_epochs` would never be sampled and get `None`.
fn epochs_per_sample(weights: &[f32], n_epochs: usize) -> Vec<Option<f32>> {
    let max = weights.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![None; weights.len()];
    }
    let floor = max / n_epochs as f32;
    weights
        .iter()
        .map(|&w| {
            if w < floor {
                return None;
            }
            let n_samples = n_epochs as f32 * (w / max);
            if n_samples > 0.0 { Some(n_epochs as f32 / n_samples) } else { None }
        })
        .collect()
}

fn clip(v: f32) -> f32 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn rdist(a: &Point2, b: &Point2) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Optimize `embedding` in place: attraction along sampled edges, repulsion
/// from uniformly drawn negative samples, with a linearly decaying step size.
pub fn optimize_layout(
    embedding: &mut [Point2],
    edges: &[(usize, usize, f32)],
    params: &LayoutParams,
    rng: &mut StdRng,
    progress: &ProgressBar,
) {
    let n_vertices = embedding.len();
    if n_vertices == 0 || edges.is_empty() || params.n_epochs == 0 {
        return;
    }
    let weights: Vec<f32> = edges.iter().map(|e| e.2).collect();
    let schedule = epochs_per_sample(&weights, params.n_epochs);
    let neg_rate = params.negative_sample_rate.max(1) as f32;

    let period: Vec<f32> = schedule.iter().map(|s| s.unwrap_or(f32::INFINITY)).collect();
    let neg_period: Vec<f32> = period.iter().map(|p| p / neg_rate).collect();
    let mut next_sample = period.clone();
    let mut next_negative = neg_period.clone();
    let (a, b) = (params.a, params.b);

    for epoch in 0..params.n_epochs {
        let n = epoch as f32;
        let alpha = params.learning_rate * (1.0 - n / params.n_epochs as f32);

        for (e, &(head, tail, _)) in edges.iter().enumerate() {
            if next_sample[e] > n {
                continue;
            }
            let mut current = embedding[head];
            let mut other = embedding[tail];
            let dist_sq = rdist(&current, &other);
            let grad_coeff = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..2 {
                let grad = clip(grad_coeff * (current[d] - other[d]));
                current[d] += grad * alpha;
                other[d] -= grad * alpha;
            }
            embedding[head] = current;
            embedding[tail] = other;
            next_sample[e] += period[e];

            let n_neg = ((n - next_negative[e]) / neg_period[e]).floor().max(0.0) as usize;
            for _ in 0..n_neg {
                let k = rng.gen_range(0..n_vertices);
                if k == head {
                    continue;
                }
                let other = embedding[k];
                let dist_sq = rdist(&current, &other);
                let grad_coeff = if dist_sq > 0.0 {
                    2.0 * b / ((REPULSION_EPSILON + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..2 {
                    let grad = if grad_coeff > 0.0 { clip(grad_coeff * (current[d] - other[d])) } else { GRADIENT_CLIP };
                    current[d] += grad * alpha;
                }
            }
            embedding[head] = current;
            next_negative[e] += n_neg as f32 * neg_period[e];
        }
        progress.inc(1);
    }
}
