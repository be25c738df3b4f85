use phylo_core::config::ProjectionSettings;
use phylo_core::error::Error;
use phylo_project::knn::exact_knn;
use phylo_project::{cosine_distance, find_ab_params, Projector};

fn normalized(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

/// Two tight groups around orthogonal directions in 8 dimensions.
fn two_groups(per_group: usize) -> Vec<Vec<f32>> {
    let mut out = Vec::new();
    for g in 0..2 {
        for i in 0..per_group {
            let mut v = vec![0.0f32; 8];
            v[g * 4] = 1.0;
            v[g * 4 + 1 + (i % 3)] = 0.05 + 0.01 * i as f32;
            out.push(normalized(v));
        }
    }
    out
}

fn dist(a: &[f32; 2], b: &[f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn settings() -> ProjectionSettings {
    ProjectionSettings { n_neighbors: 5, n_epochs: 200, ..ProjectionSettings::default() }
}

#[test]
fn cosine_distance_basics() {
    assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
}

#[test]
fn knn_rows_start_with_self_and_are_sorted() {
    let data = two_groups(4);
    let g = exact_knn(&data, 3);
    for (i, (idx, d)) in g.indices.iter().zip(g.distances.iter()).enumerate() {
        assert_eq!(idx[0], i);
        assert_eq!(idx.len(), 3);
        assert!(d.windows(2).all(|w| w[0] <= w[1]));
    }
    // k larger than the batch is clamped
    assert_eq!(exact_knn(&data, 100).indices[0].len(), data.len());
}

#[test]
fn curve_parameters_match_reference_values() {
    let (a, b) = find_ab_params(1.0, 0.1);
    assert!((a - 1.577).abs() < 0.1, "a={a}");
    assert!((b - 0.895).abs() < 0.05, "b={b}");
}

#[test]
fn projection_is_deterministic_for_fixed_seed() {
    let data = two_groups(6);
    let p = Projector::new(settings());
    let first = p.project(&data).expect("project");
    let second = p.project(&data).expect("project again");
    assert_eq!(first.len(), data.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a[0].to_bits(), b[0].to_bits());
        assert_eq!(a[1].to_bits(), b[1].to_bits());
    }
    assert!(first.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
}

#[test]
fn projection_keeps_groups_apart() {
    let per_group = 8;
    let data = two_groups(per_group);
    let coords = Projector::new(settings()).project(&data).expect("project");

    let mean = |pairs: Vec<(usize, usize)>| -> f32 {
        let n = pairs.len() as f32;
        pairs.into_iter().map(|(i, j)| dist(&coords[i], &coords[j])).sum::<f32>() / n
    };
    let mut within = Vec::new();
    let mut across = Vec::new();
    for i in 0..coords.len() {
        for j in (i + 1)..coords.len() {
            if (i < per_group) == (j < per_group) { within.push((i, j)) } else { across.push((i, j)) }
        }
    }
    let (w, x) = (mean(within), mean(across));
    assert!(w < x, "within-group spread {w} should be below cross-group distance {x}");
}

#[test]
fn projection_rejects_tiny_batches() {
    let data = vec![vec![1.0f32, 0.0], vec![0.0, 1.0]];
    match Projector::new(settings()).project(&data) {
        Err(Error::TooFewItems { needed, got, .. }) => assert_eq!((needed, got), (3, 2)),
        other => panic!("expected TooFewItems, got {other:?}"),
    }
}

#[test]
fn projection_rejects_mixed_dimensions() {
    let data = vec![vec![1.0f32, 0.0], vec![0.0, 1.0], vec![0.0, 1.0, 0.0]];
    assert!(matches!(
        Projector::new(settings()).project(&data),
        Err(Error::DimensionMismatch { .. })
    ));
}
