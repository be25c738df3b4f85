//! phylo-project
//!
//! Neighborhood-preserving projection of embedding vectors to 2D: exact
//! cosine k-NN, fuzzy simplicial set, then a seeded SGD layout. Identical
//! inputs and seed give bit-identical coordinates.

pub mod fuzzy;
pub mod knn;
pub mod layout;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use phylo_core::config::ProjectionSettings;
use phylo_core::error::{Error, Result};
use phylo_core::types::Point2;

pub use knn::cosine_distance;
pub use layout::find_ab_params;

/// Fewer points than this cannot form a meaningful 2D neighborhood layout.
pub const MIN_POINTS: usize = 3;

const INIT_RANGE: f32 = 10.0;

pub struct Projector {
    settings: ProjectionSettings,
}

impl Projector {
    pub fn new(settings: ProjectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProjectionSettings {
        &self.settings
    }

    fn n_epochs(&self, n: usize) -> usize {
        match self.settings.n_epochs {
            0 if n <= 10_000 => 500,
            0 => 200,
            e => e,
        }
    }

    /// Project an `N x D` batch to `N x 2`.
    pub fn project<E: AsRef<[f32]>>(&self, embeddings: &[E]) -> Result<Vec<Point2>> {
        let n = embeddings.len();
        if n < MIN_POINTS {
            return Err(Error::TooFewItems { stage: "projection", needed: MIN_POINTS, got: n });
        }
        let dim = embeddings[0].as_ref().len();
        for (i, e) in embeddings.iter().enumerate() {
            if e.as_ref().len() != dim || dim == 0 {
                return Err(Error::DimensionMismatch { id: format!("#{i}"), expected: dim, found: e.as_ref().len() });
            }
        }

        let k = self.settings.n_neighbors.min(n);
        let n_epochs = self.n_epochs(n);
        info!(n, dim, k, n_epochs, "projecting embeddings to 2D");

        let graph = knn::exact_knn(embeddings, k);
        let edges = fuzzy::fuzzy_simplicial_set(&graph, k);
        let (a, b) = find_ab_params(self.settings.spread, self.settings.min_dist);
        debug!(edges = edges.len(), a, b, "fuzzy graph ready");

        let mut rng = StdRng::seed_from_u64(self.settings.random_seed);
        let mut coords: Vec<Point2> = (0..n)
            .map(|_| [rng.gen_range(-INIT_RANGE..INIT_RANGE), rng.gen_range(-INIT_RANGE..INIT_RANGE)])
            .collect();

        let progress = if self.settings.show_progress {
            let pb = ProgressBar::new(n_epochs as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} epochs ({percent}%)",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let params = layout::LayoutParams {
            a,
            b,
            n_epochs,
            learning_rate: self.settings.learning_rate,
            negative_sample_rate: self.settings.negative_sample_rate,
        };
        layout::optimize_layout(&mut coords, &edges, &params, &mut rng, &progress);
        progress.finish_and_clear();

        info!(shape = ?(coords.len(), 2), "projection complete");
        Ok(coords)
    }
}
