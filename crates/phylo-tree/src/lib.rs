//! phylo-tree
//!
//! Builds the time-respecting phylogeny over clustered items:
//! similarity -> constrained distance graph -> MST -> BFS parents, plus
//! per-cluster species with month ranges.

pub mod dates;
pub mod graph;
pub mod species;
pub mod tree;

use tracing::info;

use phylo_core::config::PhylogenySettings;
use phylo_core::error::{Error, Result};
use phylo_core::store::validate_items;
use phylo_core::types::{Cluster, ClusteredItem, PhylogenyTree, Species};

pub use graph::{constrained_distances, edge_weight, similarity_matrix};
pub use species::generate_species;

#[derive(Debug, Clone, PartialEq)]
pub struct Phylogeny {
    pub tree: PhylogenyTree,
    pub species: Vec<Species>,
}

pub struct PhylogenyBuilder {
    settings: PhylogenySettings,
}

impl PhylogenyBuilder {
    pub fn new(settings: PhylogenySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PhylogenySettings {
        &self.settings
    }

    /// Items must still carry their embeddings.
    pub fn build(&self, items: &[ClusteredItem], clusters: &[Cluster]) -> Result<Phylogeny> {
        validate_items(items.iter().map(|ci| &ci.item))?;
        let timestamps: Vec<i64> = items.iter().map(|ci| ci.item.timestamp).collect();
        let root = tree::root_index(&timestamps).ok_or(Error::EmptyBatch)?;

        info!(n = items.len(), "computing similarity matrix");
        let embeddings: Vec<&[f32]> = items.iter().map(|ci| ci.item.embedding.as_slice()).collect();
        let similarity = similarity_matrix(&embeddings);

        info!("building constrained graph");
        let distances = constrained_distances(&similarity, &timestamps, &self.settings);

        info!("building minimum spanning tree");
        let edges = tree::spanning_edges(&distances, self.settings.fallback_distance);
        let parents = tree::assign_parents(items.len(), &edges, root);
        let tree = tree::build_tree(items, &parents, root);
        info!(
            "Built tree with {} nodes, root: {} ({})",
            tree.nodes.len(),
            tree.root_id,
            tree.root_date
        );

        let species = generate_species(items, clusters);
        for s in &species {
            info!("  {}: {} items ({})", s.name, s.count, s.date_range);
        }
        Ok(Phylogeny { tree, species })
    }
}
