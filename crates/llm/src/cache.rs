use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistent completion cache: a flat JSON map from rendered prompt to the
/// completions it produced. Same conventions as the other caches: missing or
/// empty file loads empty, corrupt file errors, flush rewrites in full.
pub struct CompletionCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Vec<String>>,
}

impl CompletionCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt completion cache: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading completion cache: {}", path.display()))
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn get(&self, prompt: &str) -> Option<&Vec<String>> {
        self.entries.get(prompt)
    }

    pub fn insert(&mut self, prompt: impl Into<String>, completions: Vec<String>) {
        self.entries.insert(prompt.into(), completions);
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
            .with_context(|| format!("writing completion cache: {}", path.display()))
    }
}
