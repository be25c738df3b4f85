use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item list is empty")]
    EmptyBatch,

    #[error("Invalid item '{id}': {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("Embedding dimensionality mismatch: item '{id}' has {found} dimensions, expected {expected}")]
    DimensionMismatch { id: String, expected: usize, found: usize },

    #[error("Too few items for {stage}: need at least {needed}, got {got}")]
    TooFewItems { stage: &'static str, needed: usize, got: usize },

    #[error("Length mismatch: {what} has {found} entries, expected {expected}")]
    LengthMismatch { what: &'static str, expected: usize, found: usize },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
