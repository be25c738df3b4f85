//! phylo-clip
//!
//! Zero-shot image classification over CLIP's joint text/image space, plus a
//! deterministic fake for tests and offline runs. Availability is probed once
//! through [`load_default_classifier`].

pub mod device;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use phylo_core::config::{expand_path, ClassifierSettings};
use phylo_core::traits::ZeroShotClassifier;

pub use device::select_device;
pub use pool::{cosine_scores, l2_normalize};
pub use tokenize::tokenize_batch;

const MODEL_ID: &str = "clip-vit-base-patch32";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Per-channel RGB statistics of CLIP's training data.
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];

/// Shortest side resized to `size` (bicubic), center-cropped to a square,
/// then normalized per channel with CLIP's mean and std. Returns `(3, size, size)`.
pub fn preprocess_image(img: &image::DynamicImage, size: usize) -> Result<Tensor> {
    let side = size as u32;
    let pixels = img
        .resize_to_fill(side, side, image::imageops::FilterType::CatmullRom)
        .to_rgb8()
        .into_raw();
    let mean = Tensor::new(&CLIP_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&CLIP_STD, &Device::Cpu)?.reshape((3, 1, 1))?;
    let tensor = Tensor::from_vec(pixels, (size, size, 3), &Device::Cpu)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1.0 / 255.0, 0.0)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?;
    Ok(tensor)
}

pub struct ClipClassifier {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_text_len: usize,
    /// Text features of the last prompt set; labeling reuses one vocabulary.
    text_cache: Mutex<Option<(Vec<String>, Tensor)>>,
}

impl ClipClassifier {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading CLIP model");

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let weights_path = model_dir.join(WEIGHTS_FILE);
        let weights: HashMap<String, Tensor> = candle_core::safetensors::load(&weights_path, &device)
            .with_context(|| format!("Failed to read weights from {}", weights_path.display()))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);

        let config = ClipConfig::vit_base_patch32();
        let model = ClipModel::new(vb, &config).context("Failed to build CLIP model")?;
        info!("CLIP model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            image_size: config.image_size,
            max_text_len: config.text_config.max_position_embeddings,
            text_cache: Mutex::new(None),
        })
    }

    fn load_image(&self, path: &Path) -> Result<Tensor> {
        let img = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
        preprocess_image(&img, self.image_size)
    }

    fn text_features(&self, prompts: &[String]) -> Result<Tensor> {
        let mut cache = self.text_cache.lock().map_err(|_| anyhow!("text feature cache poisoned"))?;
        if let Some((cached_prompts, features)) = cache.as_ref() {
            if cached_prompts.as_slice() == prompts {
                return Ok(features.clone());
            }
        }
        let input_ids = tokenize_batch(&self.tokenizer, prompts, self.max_text_len, &self.device)?;
        let features = self.model.get_text_features(&input_ids)?;
        *cache = Some((prompts.to_vec(), features.clone()));
        Ok(features)
    }
}

impl ZeroShotClassifier for ClipClassifier {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn classify(&self, images: &[PathBuf], prompts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut decoded = Vec::with_capacity(images.len());
        for path in images {
            match self.load_image(path) {
                Ok(t) => decoded.push(t),
                Err(e) => debug!(path = %path.display(), "skipping image: {e:#}"),
            }
        }
        if decoded.is_empty() || prompts.is_empty() {
            return Ok(Vec::new());
        }

        let pixels = Tensor::stack(&decoded, 0)?.to_device(&self.device)?;
        let image_features = self.model.get_image_features(&pixels)?;
        let text_features = self.text_features(prompts)?;
        let scores = cosine_scores(&image_features, &text_features)?;
        Ok(scores.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

/// Hash-based scores: stable per (file name, prompt), no model or file I/O.
pub struct FakeClassifier;

impl FakeClassifier {
    fn score(image: &Path, prompt: &str) -> f32 {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut hasher = XxHash64::with_seed(0);
        image.file_name().unwrap_or(image.as_os_str()).hash(&mut hasher);
        prompt.hash(&mut hasher);
        let h = hasher.finish();
        (((h >> 32) as u32) as f32) / (u32::MAX as f32)
    }
}

impl ZeroShotClassifier for FakeClassifier {
    fn model_id(&self) -> &str {
        "fake"
    }

    fn classify(&self, images: &[PathBuf], prompts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(images
            .iter()
            .map(|img| prompts.iter().map(|p| Self::score(img, p)).collect())
            .collect())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// First existing directory among the configured one, `APP_CLIP_MODEL_DIR`,
/// `CLIP_MODEL_DIR`, and `models/clip-vit-base-patch32`.
pub fn resolve_model_dir(settings: &ClassifierSettings) -> Option<PathBuf> {
    let candidates = settings
        .model_dir
        .iter()
        .cloned()
        .chain(std::env::var("APP_CLIP_MODEL_DIR").ok())
        .chain(std::env::var("CLIP_MODEL_DIR").ok())
        .chain(std::iter::once(format!("models/{MODEL_ID}")));
    for dir in candidates {
        let p = expand_path(&dir);
        if p.join(WEIGHTS_FILE).exists() && p.join(TOKENIZER_FILE).exists() {
            info!(dir = %p.display(), "using CLIP model dir");
            return Some(p);
        }
        debug!(dir = %p.display(), "no CLIP model here");
    }
    None
}

/// Probe the classifier once per run. `None` means every image cluster is
/// labeled by the path heuristic.
pub fn load_default_classifier(settings: &ClassifierSettings) -> Option<Box<dyn ZeroShotClassifier>> {
    if env_flag("APP_USE_FAKE_CLASSIFIER") {
        info!("using FakeClassifier");
        return Some(Box::new(FakeClassifier));
    }
    let Some(dir) = resolve_model_dir(settings) else {
        info!("no CLIP model found; image labels fall back to path tokens");
        return None;
    };
    match ClipClassifier::load(&dir) {
        Ok(model) => Some(Box::new(model)),
        Err(e) => {
            warn!("CLIP unavailable, image labels fall back to path tokens: {e:#}");
            None
        }
    }
}
