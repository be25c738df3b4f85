//! Domain types shared by the projection, clustering and phylogeny stages.
//!
//! Field names follow the JSON documents consumed by the visualization
//! frontend, so renames here are wire-format changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ItemId = String;
pub type Point2 = [f32; 2];

/// Cluster id reserved for points that are not density-connected to any group.
pub const NOISE: i32 = -1;

pub fn is_noise(cluster: i32) -> bool {
    cluster < 0
}

/// Which kind of corpus a run processes. Decides label strategy and file names.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Image,
    Text,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Image => "image",
            Mode::Text => "text",
        }
    }

    /// Suffix appended to intermediate file names: image mode stays unsuffixed.
    pub fn suffix(self) -> &'static str {
        match self {
            Mode::Image => "",
            Mode::Text => "_text",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Mode::Image),
            "text" => Ok(Mode::Text),
            other => Err(Error::InvalidConfig(format!("unknown mode '{other}' (expected image|text)"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Text,
}

/// One corpus element as produced by the embedding provider.
///
/// - `id`: short stable identifier (truncated file stem)
/// - `content`: path to the original file
/// - `timestamp`: modification time, seconds since epoch
/// - `embedding`: L2-normalized vector; empty once stripped for output
/// - `preview`/`full_text`: cached leading text for text items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

/// Output of the embedding provider: `{"items": [...], "mode": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

/// An item with its projected coordinates and cluster assignment merged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusteredItem {
    #[serde(flatten)]
    pub item: Item,
    pub umap: Point2,
    pub cluster: i32,
}

/// A density-connected group of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    pub id: u32,
    pub label: String,
    pub centroid: Point2,
    pub size: usize,
}

/// Intermediate document written after projection and clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredDocument {
    pub items: Vec<ClusteredItem>,
    pub clusters: Vec<Cluster>,
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeNode {
    pub id: ItemId,
    /// `None` only for the root.
    pub parent: Option<ItemId>,
    pub timestamp: i64,
    pub date: String,
    pub cluster: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

/// Rooted spanning tree over every item, noise included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhylogenyTree {
    pub nodes: Vec<TreeNode>,
    pub root_id: ItemId,
    pub root_date: String,
    pub date_range: DateRange,
}

/// A cluster annotated with the time range its members span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Species {
    pub id: String,
    pub cluster_id: u32,
    pub name: String,
    pub date_range: String,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    pub centroid: Point2,
    pub count: usize,
    pub item_ids: Vec<ItemId>,
}

/// Final document consumed by the frontend. Items carry no embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDocument {
    pub items: Vec<ClusteredItem>,
    pub clusters: Vec<Cluster>,
    pub mode: Mode,
    pub phylogeny: PhylogenyTree,
    pub species: Vec<Species>,
}
