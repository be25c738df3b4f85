use std::path::PathBuf;

/// Zero-shot image scoring in a joint image/text embedding space.
///
/// Implementations are loaded once per run by the caller and passed to the
/// clusterer; an absent classifier routes image labeling to the filename
/// heuristic.
pub trait ZeroShotClassifier: Send + Sync {
    /// Stable identifier of the backing model (e.g. `clip:vit-base-patch32`).
    fn model_id(&self) -> &str;

    /// Score every decodable image against every prompt.
    ///
    /// Returns one row per image that could be opened, in input order, each
    /// with one similarity per prompt. Images that fail to decode are skipped,
    /// so an empty result means nothing could be scored.
    fn classify(&self, images: &[PathBuf], prompts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
