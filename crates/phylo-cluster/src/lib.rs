//! phylo-cluster
//!
//! Density clustering of projected coordinates and per-cluster labeling.

pub mod hdbscan;
pub mod labels;

use tracing::{debug, info};

use phylo_core::config::{ClusteringSettings, LabelSettings};
use phylo_core::error::{Error, Result};
use phylo_core::traits::ZeroShotClassifier;
use phylo_core::types::{Cluster, Item, Mode, Point2, NOISE};

pub use labels::{ClusterLabeler, ImageLabeler, TextLabeler};

/// Per-item assignments plus one labeled record per cluster, ordered by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub assignments: Vec<i32>,
    pub clusters: Vec<Cluster>,
}

impl Clustering {
    pub fn noise_count(&self) -> usize {
        self.assignments.iter().filter(|&&c| c == NOISE).count()
    }
}

pub struct Clusterer<'a> {
    clustering: ClusteringSettings,
    labels: LabelSettings,
    classifier: Option<&'a dyn ZeroShotClassifier>,
}

impl<'a> Clusterer<'a> {
    /// `classifier` is only consulted for image-mode runs; `None` routes every
    /// image cluster to the path-token fallback.
    pub fn new(
        clustering: ClusteringSettings,
        labels: LabelSettings,
        classifier: Option<&'a dyn ZeroShotClassifier>,
    ) -> Self {
        Self { clustering, labels, classifier }
    }

    fn labeler(&self, mode: Mode) -> Box<dyn ClusterLabeler + 'a> {
        match mode {
            Mode::Image => Box::new(ImageLabeler::new(self.classifier, &self.labels)),
            Mode::Text => Box::new(TextLabeler::new(&self.labels)),
        }
    }

    pub fn cluster(&self, coords: &[Point2], items: &[Item], mode: Mode) -> Result<Clustering> {
        if coords.len() != items.len() {
            return Err(Error::LengthMismatch { what: "coordinates", expected: items.len(), found: coords.len() });
        }
        info!(
            n = coords.len(),
            min_cluster_size = self.clustering.min_cluster_size,
            min_samples = self.clustering.min_samples,
            "running density clustering"
        );
        let assignments =
            hdbscan::hdbscan(coords, self.clustering.min_cluster_size, self.clustering.min_samples);

        let n_clusters = assignments.iter().copied().max().map_or(0, |m| (m + 1).max(0) as usize);
        let labeler = self.labeler(mode);
        let mut clusters = Vec::with_capacity(n_clusters);
        for id in 0..n_clusters {
            let members: Vec<usize> =
                (0..items.len()).filter(|&i| assignments[i] == id as i32).collect();
            let mut sum = [0.0f64; 2];
            for &i in &members {
                sum[0] += f64::from(coords[i][0]);
                sum[1] += f64::from(coords[i][1]);
            }
            let size = members.len();
            let centroid = [(sum[0] / size as f64) as f32, (sum[1] / size as f64) as f32];

            let member_items: Vec<&Item> = members.iter().map(|&i| &items[i]).collect();
            let label = labeler.label(&member_items);
            debug!(cluster = id, size, label = %label, "labeled cluster");
            clusters.push(Cluster { id: id as u32, label, centroid, size });
        }

        let result = Clustering { assignments, clusters };
        info!("Found {} clusters, {} noise points", result.clusters.len(), result.noise_count());
        Ok(result)
    }
}
