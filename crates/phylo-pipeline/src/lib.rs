//! phylo-pipeline
//!
//! Coordinates the stages. Each stage consumes the previous stage's document
//! and returns a new one; nothing is mutated in place. File I/O happens only
//! in the `run_*` methods.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing::info;

use phylo_clip::load_default_classifier;
use phylo_cluster::Clusterer;
use phylo_core::config::PipelineSettings;
use phylo_core::store::{publish, read_json, validate_items, DataLayout};
use phylo_core::traits::ZeroShotClassifier;
use phylo_core::types::{ClusteredDocument, ClusteredItem, FinalDocument, Mode, RawDocument};
use phylo_project::Projector;
use phylo_tree::PhylogenyBuilder;

pub struct Pipeline {
    settings: PipelineSettings,
    layout: DataLayout,
    classifier: OnceLock<Option<Box<dyn ZeroShotClassifier>>>,
}

impl Pipeline {
    /// The classifier is probed lazily, at most once, on the first image-mode run.
    pub fn new(settings: PipelineSettings) -> Self {
        let layout = DataLayout::from_settings(&settings.data);
        Self { settings, layout, classifier: OnceLock::new() }
    }

    /// Use `classifier` instead of probing; `None` forces the path fallback.
    pub fn with_classifier(settings: PipelineSettings, classifier: Option<Box<dyn ZeroShotClassifier>>) -> Self {
        let layout = DataLayout::from_settings(&settings.data);
        Self { settings, layout, classifier: OnceLock::from(classifier) }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn classifier(&self) -> Option<&dyn ZeroShotClassifier> {
        self.classifier.get_or_init(|| load_default_classifier(&self.settings.classifier)).as_deref()
    }

    /// Validate, project and cluster a raw document. `mode` overrides the
    /// document's own mode, which otherwise defaults to image.
    pub fn cluster_document(&self, raw: RawDocument, mode: Option<Mode>) -> Result<ClusteredDocument> {
        let mode = mode.or(raw.mode).unwrap_or_default();
        let dim = validate_items(&raw.items).context("invalid input items")?;
        info!(items = raw.items.len(), dim, mode = %mode, "clustering");

        let embeddings: Vec<&[f32]> = raw.items.iter().map(|i| i.embedding.as_slice()).collect();
        let coords = Projector::new(self.settings.projection.clone())
            .project(&embeddings)
            .context("projection failed")?;

        let classifier = match mode {
            Mode::Image => self.classifier(),
            Mode::Text => None,
        };
        let clusterer = Clusterer::new(self.settings.clustering.clone(), self.settings.labels.clone(), classifier);
        let clustering = clusterer.cluster(&coords, &raw.items, mode).context("clustering failed")?;

        let items = raw
            .items
            .into_iter()
            .zip(coords)
            .zip(clustering.assignments)
            .map(|((item, umap), cluster)| ClusteredItem { item, umap, cluster })
            .collect();
        Ok(ClusteredDocument { items, clusters: clustering.clusters, mode })
    }

    /// Build the phylogeny and species, then drop embeddings from every item.
    pub fn phylogeny_document(&self, doc: ClusteredDocument) -> Result<FinalDocument> {
        let phylogeny = PhylogenyBuilder::new(self.settings.phylogeny.clone())
            .build(&doc.items, &doc.clusters)
            .context("phylogeny construction failed")?;
        let items = doc
            .items
            .into_iter()
            .map(|mut ci| {
                ci.item.embedding = Vec::new();
                ci
            })
            .collect();
        Ok(FinalDocument {
            items,
            clusters: doc.clusters,
            mode: doc.mode,
            phylogeny: phylogeny.tree,
            species: phylogeny.species,
        })
    }

    /// Raw file -> clustered file (plus the frontend mirror).
    pub fn run_cluster_stage(&self, mode: Option<Mode>) -> Result<(ClusteredDocument, Vec<PathBuf>)> {
        let raw_path = self.layout.raw_path(mode.unwrap_or_default());
        info!(path = %raw_path.display(), "loading embeddings");
        let raw: RawDocument =
            read_json(&raw_path).with_context(|| format!("failed to load {}", raw_path.display()))?;
        let doc = self.cluster_document(raw, mode)?;
        let written = publish(&self.layout, &self.layout.clustered_path(doc.mode), doc.mode, &doc)
            .context("failed to write clustered document")?;
        Ok((doc, written))
    }

    /// Clustered file -> final file (plus the frontend mirror).
    pub fn run_phylogeny_stage(&self, mode: Option<Mode>) -> Result<(FinalDocument, Vec<PathBuf>)> {
        let clustered_path = self.layout.clustered_path(mode.unwrap_or_default());
        info!(path = %clustered_path.display(), "loading clustered data");
        let doc: ClusteredDocument = read_json(&clustered_path)
            .with_context(|| format!("failed to load {}", clustered_path.display()))?;
        let doc = self.phylogeny_document(doc)?;
        let written = publish(&self.layout, &self.layout.final_path(doc.mode), doc.mode, &doc)
            .context("failed to write final document")?;
        Ok((doc, written))
    }

    /// Both stages back to back; the clustered file is still written.
    pub fn run(&self, mode: Option<Mode>) -> Result<(FinalDocument, Vec<PathBuf>)> {
        let (clustered, mut written) = self.run_cluster_stage(mode).context("cluster stage failed")?;
        let doc = self.phylogeny_document(clustered).context("phylogeny stage failed")?;
        written.extend(
            publish(&self.layout, &self.layout.final_path(doc.mode), doc.mode, &doc)
                .context("failed to write final document")?,
        );
        Ok((doc, written))
    }
}
