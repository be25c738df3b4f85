use std::collections::HashMap;
use std::path::Path;

use phylo_clip::FakeClassifier;
use phylo_cluster::labels::{title_case, IMAGE_LABELS};
use phylo_cluster::Clusterer;
use phylo_core::config::{ClusteringSettings, DataSettings, LabelSettings, PipelineSettings, ProjectionSettings};
use phylo_core::error::Error;
use phylo_core::store::{read_json, write_json_atomic};
use phylo_core::types::{FinalDocument, Item, ItemKind, Mode, RawDocument, NOISE};
use phylo_pipeline::Pipeline;
use phylo_project::Projector;

const DAY: i64 = 24 * 60 * 60;
const BASE: i64 = 1_690_000_000;

fn settings(root: &Path) -> PipelineSettings {
    PipelineSettings {
        data: DataSettings {
            dir: root.join("data").to_string_lossy().into_owned(),
            public_dir: root.join("public").to_string_lossy().into_owned(),
        },
        projection: ProjectionSettings { n_neighbors: 5, n_epochs: 200, ..ProjectionSettings::default() },
        clustering: ClusteringSettings { min_cluster_size: 3, min_samples: 2 },
        ..PipelineSettings::default()
    }
}

fn normalized(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

/// Two groups of `per_group` items around orthogonal directions, the second
/// group starting 200 days after the first.
fn raw_document(kind: ItemKind, per_group: usize) -> RawDocument {
    let mut items = Vec::new();
    for g in 0..2usize {
        for i in 0..per_group {
            let mut v = vec![0.0f32; 8];
            v[g * 4] = 1.0;
            v[g * 4 + 1 + (i % 3)] = 0.05 + 0.01 * i as f32;
            let (content, preview) = match kind {
                ItemKind::Image => (format!("/photos/{}_{i}.jpg", ["harbor", "forest"][g]), None),
                ItemKind::Text => (
                    format!("/notes/n{g}_{i}.md"),
                    Some(["sailing boats harbor sailing", "forest trails hiking forest"][g].to_string()),
                ),
            };
            items.push(Item {
                id: format!("{g}-{i}"),
                kind,
                content,
                timestamp: BASE + (g as i64) * 200 * DAY + i as i64 * DAY,
                embedding: normalized(v),
                preview,
                full_text: None,
            });
        }
    }
    let mode = match kind {
        ItemKind::Image => Mode::Image,
        ItemKind::Text => Mode::Text,
    };
    RawDocument { items, mode: Some(mode) }
}

/// Two groups of three: similarity > 0.9 within a group and < 0.3 across,
/// 10 days within each group and 200 days between them.
fn six_items() -> Vec<Item> {
    let rows: [(&str, i64, [f32; 4]); 6] = [
        ("a0", 0, [1.0, 0.10, 0.0, 0.0]),
        ("a1", 5, [1.0, 0.15, 0.0, 0.0]),
        ("a2", 10, [1.0, 0.05, 0.05, 0.0]),
        ("b0", 210, [0.0, 0.0, 1.0, 0.10]),
        ("b1", 215, [0.0, 0.05, 1.0, 0.15]),
        ("b2", 220, [0.0, 0.0, 1.0, 0.05]),
    ];
    rows.iter()
        .map(|(id, day, v)| Item {
            id: id.to_string(),
            kind: ItemKind::Image,
            content: format!("/photos/{id}.jpg"),
            timestamp: BASE + day * DAY,
            embedding: normalized(v.to_vec()),
            preview: None,
            full_text: None,
        })
        .collect()
}

fn assert_invariants(doc: &FinalDocument) {
    let n = doc.items.len();
    let noise = doc.items.iter().filter(|ci| ci.cluster == NOISE).count();
    let total: usize = doc.clusters.iter().map(|c| c.size).sum();
    assert_eq!(total, n - noise);
    for c in &doc.clusters {
        assert_eq!(doc.items.iter().filter(|ci| ci.cluster == c.id as i32).count(), c.size);
        assert!(!c.label.contains('/'));
    }

    let parents: HashMap<&str, Option<&str>> =
        doc.phylogeny.nodes.iter().map(|node| (node.id.as_str(), node.parent.as_deref())).collect();
    assert_eq!(doc.phylogeny.nodes.len(), n);
    assert_eq!(parents.values().filter(|p| p.is_none()).count(), 1);
    for node in &doc.phylogeny.nodes {
        let mut current = node.id.as_str();
        let mut steps = 0;
        while let Some(Some(p)) = parents.get(current) {
            current = *p;
            steps += 1;
            assert!(steps <= n);
        }
        assert_eq!(current, doc.phylogeny.root_id);
    }

    assert!(doc.species.windows(2).all(|w| w[0].min_timestamp <= w[1].min_timestamp));
    for s in &doc.species {
        assert_eq!(s.count, s.item_ids.len());
    }
    assert!(doc.items.iter().all(|ci| ci.item.embedding.is_empty()));
}

#[test]
fn cluster_then_phylogeny_holds_invariants() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let clustered = pipeline.cluster_document(raw_document(ItemKind::Image, 6), None).expect("cluster");
    assert_eq!(clustered.mode, Mode::Image);
    assert!(clustered.items.iter().all(|ci| !ci.item.embedding.is_empty()));

    let doc = pipeline.phylogeny_document(clustered).expect("phylogeny");
    assert_invariants(&doc);
    assert_eq!(doc.phylogeny.root_id, "0-0");
}

#[test]
fn repeated_runs_are_identical() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let a = pipeline.cluster_document(raw_document(ItemKind::Image, 6), None).expect("first");
    let b = pipeline.cluster_document(raw_document(ItemKind::Image, 6), None).expect("second");
    assert_eq!(a.items, b.items);
    assert_eq!(a.clusters, b.clusters);

    let ta = pipeline.phylogeny_document(a).expect("tree a");
    let tb = pipeline.phylogeny_document(b).expect("tree b");
    assert_eq!(ta.phylogeny, tb.phylogeny);
    assert_eq!(ta.species, tb.species);
}

#[test]
fn fake_classifier_labels_come_from_vocabulary() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), Some(Box::new(FakeClassifier)));
    let doc = pipeline.cluster_document(raw_document(ItemKind::Image, 6), None).expect("cluster");
    let vocabulary: Vec<String> = IMAGE_LABELS.iter().map(|l| title_case(l)).collect();
    for c in &doc.clusters {
        assert!(vocabulary.contains(&c.label), "unexpected label {}", c.label);
    }
}

#[test]
fn text_mode_uses_content_words() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), Some(Box::new(FakeClassifier)));
    let doc = pipeline.cluster_document(raw_document(ItemKind::Text, 6), None).expect("cluster");
    assert_eq!(doc.mode, Mode::Text);
    for c in &doc.clusters {
        assert!(["Sailing", "Forest", "Harbor", "Trails", "Boats", "Hiking"].contains(&c.label.as_str()), "{}", c.label);
    }
}

#[test]
fn run_writes_clustered_final_and_public_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let data = tmp.path().join("data");
    write_json_atomic(&data.join("embeddings_raw.json"), &raw_document(ItemKind::Image, 6)).expect("seed");

    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let (doc, written) = pipeline.run(None).expect("run");
    assert_invariants(&doc);

    assert!(data.join("embeddings_clustered.json").exists());
    assert!(data.join("embeddings_image.json").exists());
    assert!(tmp.path().join("public").join("embeddings_image.json").exists());
    assert!(written.contains(&data.join("embeddings_image.json")));

    let text = std::fs::read_to_string(data.join("embeddings_image.json")).expect("read final");
    assert!(!text.contains("\"embedding\""));
    let reloaded: FinalDocument = read_json(&data.join("embeddings_image.json")).expect("parse final");
    assert_eq!(reloaded.phylogeny, doc.phylogeny);

    // the phylogeny stage alone reproduces the same tree from the clustered file
    let (again, _) = pipeline.run_phylogeny_stage(None).expect("phylogeny stage");
    assert_eq!(again.phylogeny, doc.phylogeny);
}

#[test]
fn text_mode_files_use_text_suffix() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let data = tmp.path().join("data");
    write_json_atomic(&data.join("embeddings_raw_text.json"), &raw_document(ItemKind::Text, 6)).expect("seed");

    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    pipeline.run_cluster_stage(Some(Mode::Text)).expect("cluster stage");
    assert!(data.join("embeddings_clustered_text.json").exists());
    pipeline.run_phylogeny_stage(Some(Mode::Text)).expect("phylogeny stage");
    assert!(data.join("embeddings_text.json").exists());
    assert!(tmp.path().join("public").join("embeddings_text.json").exists());
}

#[test]
fn missing_input_names_the_stage() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let err = pipeline.run(None).expect_err("no raw file");
    assert!(format!("{err:#}").contains("cluster stage failed"));
    assert!(matches!(err.root_cause().downcast_ref::<Error>(), Some(Error::NotFound(_))));
}

#[test]
fn malformed_input_writes_nothing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let data = tmp.path().join("data");
    let mut raw = raw_document(ItemKind::Image, 3);
    raw.items[2].embedding = vec![1.0, 0.0];
    write_json_atomic(&data.join("embeddings_raw.json"), &raw).expect("seed");

    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let err = pipeline.run(None).expect_err("dimension mismatch");
    assert!(format!("{err:#}").contains("dimensionality"));
    assert!(!data.join("embeddings_clustered.json").exists());
    assert!(!data.join("embeddings_image.json").exists());
}

#[test]
fn six_items_form_two_clusters_of_three() {
    let items = six_items();
    let embeddings: Vec<&[f32]> = items.iter().map(|i| i.embedding.as_slice()).collect();
    let coords = Projector::new(ProjectionSettings::default()).project(&embeddings).expect("project");

    // min_samples must stay below the group size: with the default of 3 every
    // point's core distance reaches into the other group and all six are noise.
    let clustering_settings = ClusteringSettings { min_cluster_size: 3, min_samples: 2 };
    let clustering = Clusterer::new(clustering_settings, LabelSettings::default(), None)
        .cluster(&coords, &items, Mode::Image)
        .expect("cluster");

    assert_eq!(clustering.clusters.len(), 2);
    assert_eq!(clustering.clusters.iter().map(|c| c.size).collect::<Vec<_>>(), vec![3, 3]);
    assert_eq!(clustering.noise_count(), 0);
    assert_eq!(clustering.assignments[0], clustering.assignments[1]);
    assert_eq!(clustering.assignments[1], clustering.assignments[2]);
    assert_eq!(clustering.assignments[3], clustering.assignments[4]);
    assert_eq!(clustering.assignments[4], clustering.assignments[5]);
    assert_ne!(clustering.assignments[0], clustering.assignments[3]);
}

#[test]
fn injected_absent_classifier_is_never_probed() {
    std::env::set_var("APP_USE_FAKE_CLASSIFIER", "1");
    let tmp = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::with_classifier(settings(tmp.path()), None);
    let doc = pipeline.cluster_document(raw_document(ItemKind::Image, 6), None).expect("cluster");
    assert!(!doc.clusters.is_empty());
    // path tokens, not the zero-shot vocabulary
    for c in &doc.clusters {
        assert_eq!(c.label, "Photos");
    }
}
