//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_PROJECTION__N_NEIGHBORS=10`). Path values expand `~` and `${VAR}`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(PipelineSettings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment; defaults are not layered in.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed pipeline settings.
    pub fn settings(&self) -> anyhow::Result<PipelineSettings> {
        let settings: PipelineSettings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read pipeline settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub data: DataSettings,
    pub projection: ProjectionSettings,
    pub clustering: ClusteringSettings,
    pub labels: LabelSettings,
    pub phylogeny: PhylogenySettings,
    pub classifier: ClassifierSettings,
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        self.projection.validate()?;
        self.clustering.validate()?;
        self.phylogeny.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    pub dir: String,
    /// Mirror directory read by the visualization frontend. Empty disables it.
    pub public_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { dir: "data".to_string(), public_dir: "frontend/public/data".to_string() }
    }
}

impl DataSettings {
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.dir)
    }

    pub fn public_dir(&self) -> Option<PathBuf> {
        if self.public_dir.trim().is_empty() { None } else { Some(expand_path(&self.public_dir)) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectionSettings {
    /// Neighborhood size, counting the point itself.
    pub n_neighbors: usize,
    pub min_dist: f32,
    pub spread: f32,
    /// 0 picks a size-dependent default.
    pub n_epochs: usize,
    pub learning_rate: f32,
    pub negative_sample_rate: usize,
    pub random_seed: u64,
    pub show_progress: bool,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 0,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            random_seed: 42,
            show_progress: false,
        }
    }
}

impl ProjectionSettings {
    fn validate(&self) -> Result<()> {
        if self.n_neighbors < 2 {
            return Err(Error::InvalidConfig(format!("projection.n_neighbors must be >= 2 (got {})", self.n_neighbors)));
        }
        if !(self.min_dist >= 0.0 && self.min_dist.is_finite()) {
            return Err(Error::InvalidConfig(format!("projection.min_dist must be >= 0 (got {})", self.min_dist)));
        }
        if !(self.spread > 0.0 && self.spread.is_finite()) {
            return Err(Error::InvalidConfig(format!("projection.spread must be > 0 (got {})", self.spread)));
        }
        if self.min_dist > self.spread {
            return Err(Error::InvalidConfig("projection.min_dist must not exceed projection.spread".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!("projection.learning_rate must be > 0 (got {})", self.learning_rate)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusteringSettings {
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self { min_cluster_size: 5, min_samples: 3 }
    }
}

impl ClusteringSettings {
    fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(Error::InvalidConfig(format!("clustering.min_cluster_size must be >= 2 (got {})", self.min_cluster_size)));
        }
        if self.min_samples < 1 {
            return Err(Error::InvalidConfig("clustering.min_samples must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelSettings {
    pub image_sample_size: usize,
    pub fallback_path_limit: usize,
    pub text_sample_size: usize,
    pub text_read_chars: usize,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self { image_sample_size: 5, fallback_path_limit: 40, text_sample_size: 10, text_read_chars: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhylogenySettings {
    pub temporal_threshold_secs: i64,
    pub similarity_threshold: f32,
    pub temporal_penalty: f64,
    /// Stand-in weight for pairs with no edge so a spanning tree always exists.
    pub fallback_distance: f64,
}

impl Default for PhylogenySettings {
    fn default() -> Self {
        Self {
            temporal_threshold_secs: 30 * 24 * 60 * 60,
            similarity_threshold: 0.85,
            temporal_penalty: 0.01,
            fallback_distance: 1000.0,
        }
    }
}

impl PhylogenySettings {
    fn validate(&self) -> Result<()> {
        if self.temporal_threshold_secs <= 0 {
            return Err(Error::InvalidConfig("phylogeny.temporal_threshold_secs must be > 0".to_string()));
        }
        if !self.similarity_threshold.is_finite() || !self.temporal_penalty.is_finite() {
            return Err(Error::InvalidConfig("phylogeny thresholds must be finite".to_string()));
        }
        // Must dominate every real edge (1 - similarity is at most 2).
        if !(self.fallback_distance.is_finite() && self.fallback_distance > 2.0) {
            return Err(Error::InvalidConfig(format!(
                "phylogeny.fallback_distance must be finite and greater than 2 (got {})",
                self.fallback_distance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    pub model_dir: Option<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
