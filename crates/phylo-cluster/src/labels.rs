//! Cluster label strategies.
//!
//! Image clusters are labeled by zero-shot classification when a classifier is
//! available, otherwise from tokens in the member file paths. Text clusters
//! are labeled by their most frequent content word. Every strategy returns
//! exactly one label.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use phylo_core::config::LabelSettings;
use phylo_core::store::read_text_prefix;
use phylo_core::traits::ZeroShotClassifier;
use phylo_core::types::Item;

pub const IMAGE_LABELS: [&str; 36] = [
    "landscape painting",
    "portrait",
    "architecture",
    "vehicle",
    "car",
    "military",
    "nature photography",
    "abstract art",
    "digital art",
    "vintage photograph",
    "movie still",
    "product photo",
    "fashion",
    "interior design",
    "furniture",
    "technology",
    "diagram",
    "map",
    "meme",
    "screenshot",
    "UI design",
    "illustration",
    "sculpture",
    "historical photo",
    "aerial view",
    "food",
    "animal",
    "person",
    "building",
    "artwork",
    "document",
    "book cover",
    "poster",
    "romantic painting",
    "impressionist art",
    "classical art",
];

pub const IMAGE_PLACEHOLDER: &str = "Images";
pub const TEXT_PLACEHOLDER: &str = "misc";

const PATH_STOPWORDS: &[&str] = &[
    "image", "images", "img", "jpeg", "jpg", "png", "webp", "gif", "final", "copy", "screen", "screenshot", "photo",
    "pics", "picture", "download", "downloads", "edited", "edit", "export", "output",
];

const TEXT_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "is", "are", "was",
    "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may",
    "might", "must", "shall", "can", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they",
    "what", "which", "who", "when", "where", "why", "how", "all", "each", "every", "both", "few", "more", "most",
    "other", "some", "such", "no", "not", "only", "same", "so", "than", "too", "very", "just", "also", "now", "here",
    "there", "then", "if", "as", "because", "until", "while", "about", "into", "through", "during", "before", "after",
    "above", "below",
];

const TEXT_TRIM: &[char] = &['.', ',', '!', '?', '(', ')', '[', ']', '{', '}', '"', ':', ';', '-', '_', '#', '*'];

/// Produces one human-readable label for a cluster's members.
pub trait ClusterLabeler {
    fn label(&self, members: &[&Item]) -> String;
}

/// Word-boundary capitalization: the first letter of every alphabetic run is
/// upper-cased and the rest lower-cased ("UI design" -> "Ui Design").
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Insertion-ordered frequency count; ties go to the token seen first.
#[derive(Default)]
struct TokenCounts {
    order: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl TokenCounts {
    fn add(&mut self, token: &str) {
        match self.index.get(token) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(token.to_string(), self.order.len());
                self.order.push((token.to_string(), 1));
            }
        }
    }

    fn most_common(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.order {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(token, _)| token.as_str())
    }
}

/// Average score rows column-wise and return the best candidate index
/// (first on ties). `None` when there are no rows or a row has the wrong width.
pub fn best_candidate(rows: &[Vec<f32>], n_candidates: usize) -> Option<usize> {
    if rows.is_empty() || n_candidates == 0 || rows.iter().any(|r| r.len() != n_candidates) {
        return None;
    }
    let mut mean = vec![0.0f64; n_candidates];
    for row in rows {
        for (m, &s) in mean.iter_mut().zip(row.iter()) {
            *m += f64::from(s);
        }
    }
    let mut best = 0usize;
    for (i, &m) in mean.iter().enumerate() {
        if m > mean[best] {
            best = i;
        }
    }
    Some(best)
}

/// Most frequent lowercase `a-z` run of at least 4 characters across the
/// first `limit` paths, ignoring file jargon. Title-cased, or `Images`.
pub fn fallback_image_label(paths: &[&str], limit: usize) -> String {
    let mut counts = TokenCounts::default();
    for path in paths.iter().take(limit) {
        let lowered = path.to_lowercase();
        for token in lowered.split(|c: char| !c.is_ascii_lowercase()) {
            if token.len() >= 4 && !PATH_STOPWORDS.contains(&token) {
                counts.add(token);
            }
        }
    }
    counts.most_common().map_or_else(|| IMAGE_PLACEHOLDER.to_string(), title_case)
}

/// Content words of `text`: lowercased, whitespace-split, edge punctuation
/// trimmed, longer than 3 characters, alphabetic, not a stopword.
pub fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let word = raw.to_lowercase();
        let word = word.trim_matches(|c: char| TEXT_TRIM.contains(&c));
        let keep = word.chars().count() > 3
            && word.chars().all(char::is_alphabetic)
            && !TEXT_STOPWORDS.contains(&word);
        keep.then(|| word.to_string())
    })
}

pub struct ImageLabeler<'a> {
    classifier: Option<&'a dyn ZeroShotClassifier>,
    sample_size: usize,
    fallback_path_limit: usize,
    prompts: Vec<String>,
}

impl<'a> ImageLabeler<'a> {
    pub fn new(classifier: Option<&'a dyn ZeroShotClassifier>, settings: &LabelSettings) -> Self {
        Self {
            classifier,
            sample_size: settings.image_sample_size,
            fallback_path_limit: settings.fallback_path_limit,
            prompts: IMAGE_LABELS.iter().map(|l| format!("a photo of {l}")).collect(),
        }
    }

    fn classify(&self, classifier: &dyn ZeroShotClassifier, paths: &[&str]) -> Option<String> {
        let sample: Vec<PathBuf> = paths.iter().take(self.sample_size).map(PathBuf::from).collect();
        match classifier.classify(&sample, &self.prompts) {
            Ok(rows) if rows.is_empty() => {
                debug!(sampled = sample.len(), "no decodable images in sample");
                None
            }
            Ok(rows) => {
                let best = best_candidate(&rows, IMAGE_LABELS.len());
                if best.is_none() {
                    warn!(model = classifier.model_id(), "classifier returned malformed scores");
                }
                best.map(|i| title_case(IMAGE_LABELS[i]))
            }
            Err(e) => {
                warn!(model = classifier.model_id(), "zero-shot classification failed: {e:#}");
                None
            }
        }
    }
}

impl ClusterLabeler for ImageLabeler<'_> {
    fn label(&self, members: &[&Item]) -> String {
        let paths: Vec<&str> = members.iter().map(|m| m.content.as_str()).collect();
        self.classifier
            .and_then(|c| self.classify(c, &paths))
            .unwrap_or_else(|| fallback_image_label(&paths, self.fallback_path_limit))
    }
}

pub struct TextLabeler {
    sample_size: usize,
    read_chars: usize,
}

impl TextLabeler {
    pub fn new(settings: &LabelSettings) -> Self {
        Self { sample_size: settings.text_sample_size, read_chars: settings.text_read_chars }
    }

    fn sample_text(&self, item: &Item) -> Option<String> {
        if let Some(preview) = item.preview.as_deref().filter(|p| !p.is_empty()) {
            return Some(preview.to_string());
        }
        match read_text_prefix(Path::new(&item.content), self.read_chars) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(id = %item.id, path = %item.content, "skipping unreadable text: {e}");
                None
            }
        }
    }
}

impl ClusterLabeler for TextLabeler {
    fn label(&self, members: &[&Item]) -> String {
        let mut counts = TokenCounts::default();
        for item in members.iter().take(self.sample_size) {
            if let Some(text) = self.sample_text(item) {
                for word in content_words(&text) {
                    counts.add(&word);
                }
            }
        }
        counts.most_common().map_or_else(|| TEXT_PLACEHOLDER.to_string(), title_case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("UI design"), "Ui Design");
        assert_eq!(title_case("landscape painting"), "Landscape Painting");
        assert_eq!(title_case("3d model"), "3D Model");
    }

    #[test]
    fn ties_go_to_first_seen() {
        let mut c = TokenCounts::default();
        for t in ["beta", "alpha", "alpha", "beta"] {
            c.add(t);
        }
        assert_eq!(c.most_common(), Some("beta"));
    }

    #[test]
    fn best_candidate_rejects_ragged_rows() {
        assert_eq!(best_candidate(&[vec![0.1, 0.9], vec![0.2, 0.3]], 2), Some(1));
        assert_eq!(best_candidate(&[vec![0.5, 0.5]], 2), Some(0));
        assert_eq!(best_candidate(&[vec![0.5]], 2), None);
        assert_eq!(best_candidate(&[], 2), None);
    }
}
