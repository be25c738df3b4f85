//! JSON document store: file naming, input validation and atomic writes.
//!
//! Downstream consumers locate files purely by name, so the naming rules in
//! [`DataLayout`] are part of the output contract.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DataSettings;
use crate::error::{Error, Result};
use crate::types::{Item, Mode};

#[derive(Debug, Clone)]
pub struct DataLayout {
    data_dir: PathBuf,
    public_dir: Option<PathBuf>,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>, public_dir: Option<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), public_dir }
    }

    pub fn from_settings(settings: &DataSettings) -> Self {
        Self::new(settings.data_dir(), settings.public_dir())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `embeddings_raw_<mode>.json`, or the generic `embeddings_raw.json` when
    /// the mode-specific file does not exist.
    pub fn raw_path(&self, mode: Mode) -> PathBuf {
        let specific = self.data_dir.join(format!("embeddings_raw_{}.json", mode.as_str()));
        if specific.exists() { specific } else { self.data_dir.join("embeddings_raw.json") }
    }

    pub fn clustered_path(&self, mode: Mode) -> PathBuf {
        self.data_dir.join(format!("embeddings_clustered{}.json", mode.suffix()))
    }

    pub fn final_path(&self, mode: Mode) -> PathBuf {
        self.data_dir.join(format!("embeddings_{}.json", mode.as_str()))
    }

    /// Where the frontend picks up data for `mode`, if a mirror is configured.
    pub fn public_path(&self, mode: Mode) -> Option<PathBuf> {
        self.public_dir.as_ref().map(|dir| dir.join(format!("embeddings_{}.json", mode.as_str())))
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::Io { path: path.to_path_buf(), source }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// Serialize `value` next to `path` and rename it into place, so readers only
/// ever observe a complete file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|source| Error::Io { path: dir.clone(), source })?;
    let bytes = serde_json::to_vec(value).map_err(|source| Error::Json { path: path.to_path_buf(), source })?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| Error::Io { path: dir.clone(), source })?;
    let tmp_path = tmp.path().to_path_buf();
    tmp.write_all(&bytes).map_err(|source| Error::Io { path: tmp_path.clone(), source })?;
    tmp.as_file().sync_all().map_err(|source| Error::Io { path: tmp_path, source })?;
    tmp.persist(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e.error })?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote document");
    Ok(())
}

/// Write `value` to `path` and, when configured, to the frontend mirror.
pub fn publish<T: Serialize>(layout: &DataLayout, path: &Path, mode: Mode, value: &T) -> Result<Vec<PathBuf>> {
    let mut written = vec![path.to_path_buf()];
    write_json_atomic(path, value)?;
    if let Some(public) = layout.public_path(mode) {
        write_json_atomic(&public, value)?;
        written.push(public);
    }
    for p in &written {
        info!(path = %p.display(), "saved");
    }
    Ok(written)
}

/// Check the batch invariants every stage relies on and return the shared
/// embedding dimensionality.
pub fn validate_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Result<usize> {
    let mut dim: Option<usize> = None;
    for (idx, item) in items.into_iter().enumerate() {
        if item.id.is_empty() {
            return Err(Error::InvalidItem { id: format!("#{idx}"), reason: "missing id".to_string() });
        }
        if item.timestamp < 0 {
            return Err(Error::InvalidItem {
                id: item.id.clone(),
                reason: format!("negative timestamp {}", item.timestamp),
            });
        }
        if item.embedding.is_empty() {
            return Err(Error::InvalidItem { id: item.id.clone(), reason: "missing embedding".to_string() });
        }
        let expected = *dim.get_or_insert(item.embedding.len());
        if item.embedding.len() != expected {
            return Err(Error::DimensionMismatch { id: item.id.clone(), expected, found: item.embedding.len() });
        }
        if item.embedding.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidItem { id: item.id.clone(), reason: "non-finite embedding value".to_string() });
        }
    }
    dim.ok_or(Error::EmptyBatch)
}

/// Read at most `max_chars` characters from the start of a text file.
/// Only the first `4 * max_chars` bytes are read; invalid UTF-8 is dropped.
pub fn read_text_prefix(path: &Path, max_chars: usize) -> std::io::Result<String> {
    let budget = (max_chars as u64).saturating_mul(4);
    let mut bytes = Vec::new();
    fs::File::open(path)?.take(budget).read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .take(max_chars)
        .collect())
}
