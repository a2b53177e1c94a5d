use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::provider::EmbeddingClient;

/// Persistent embedding cache: a flat JSON map from string to vector.
///
/// A missing or empty file loads as an empty cache; a present but
/// unparseable file is an error for the run. Flushing rewrites the whole
/// file, creating parent directories on demand.
pub struct EmbeddingCache {
    path: Option<PathBuf>,
    entries: FxHashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: FxHashMap::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => FxHashMap::default(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt embedding cache: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FxHashMap::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading embedding cache: {}", path.display()))
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Vec<f32>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, vector: Vec<f32>) {
        self.entries.insert(key.into(), vector);
    }

    pub fn merge(&mut self, other: FxHashMap<String, Vec<f32>>) {
        self.entries.extend(other);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory: {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, raw)
            .with_context(|| format!("writing embedding cache: {}", path.display()))
    }
}

/// Provider plus cache behind one handle. Embeddings are created lazily on
/// first request and retained for the process lifetime; `flush` persists the
/// cache at pass boundaries.
pub struct EmbeddingEngine {
    client: EmbeddingClient,
    cache: EmbeddingCache,
}

impl EmbeddingEngine {
    pub fn new(client: EmbeddingClient, cache: EmbeddingCache) -> Self {
        Self { client, cache }
    }

    /// In-memory engine over the deterministic hash backend.
    pub fn offline() -> Self {
        Self::new(EmbeddingClient::hash(), EmbeddingCache::in_memory())
    }

    pub fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit.clone());
        }
        tracing::debug!(text, "embedding cache miss");
        let vector = self.client.embed(text)?;
        self.cache.insert(text, vector.clone());
        Ok(vector)
    }

    /// Per-word embeddings over the non-word-character boundary, each word
    /// going through the cache.
    pub fn word_embeddings(&mut self, text: &str) -> Result<FxHashMap<String, Vec<f32>>> {
        let words = self.client.word_embeddings(text)?;
        let mut out = FxHashMap::default();
        for (word, vector) in words {
            if let Some(hit) = self.cache.get(&word) {
                out.insert(word, hit.clone());
            } else {
                self.cache.insert(word.clone(), vector.clone());
                out.insert(word, vector);
            }
        }
        Ok(out)
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn flush(&self) -> Result<()> {
        self.cache.flush()
    }
}
