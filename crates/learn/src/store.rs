use std::fs;
use std::path::{Path, PathBuf};

use spanlearn_core::{Toi, ToiDict};

use crate::error::Result;

/// Persistent token-of-interest dictionary: a flat JSON map from input
/// string to a two-element `[left, right]` record.
///
/// The file is read fully before a consuming operation and rewritten fully
/// at pass boundaries. A missing or empty file is an empty store; a present
/// but unparseable file is an error for the run.
pub struct ToiStore {
    path: Option<PathBuf>,
    entries: ToiDict,
}

impl ToiStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: ToiDict::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => ToiDict::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ToiDict::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn get(&self, input: &str) -> Option<&Toi> {
        self.entries.get(input)
    }

    pub fn insert(&mut self, input: impl Into<String>, toi: Toi) {
        self.entries.insert(input.into(), toi);
    }

    /// Add new keys and overwrite existing ones.
    pub fn merge(&mut self, other: ToiDict) {
        self.entries.extend(other);
    }

    pub fn entries(&self) -> &ToiDict {
        &self.entries
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
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToiStore::load(dir.path().join("toi.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toi.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(ToiStore::load(&path).is_err());
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut store = ToiStore::in_memory();
        store.insert("in", Toi::new("old", "old"));

        let mut update = ToiDict::new();
        update.insert("in".to_string(), Toi::new("new", "new"));
        update.insert("other".to_string(), Toi::empty());
        store.merge(update);

        assert_eq!(store.get("in"), Some(&Toi::new("new", "new")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn flush_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/toi.json");

        let mut store = ToiStore::load(&path).unwrap();
        store.insert("Total: 42 USD", Toi::new("Total:", ""));
        store.flush().unwrap();

        let reloaded = ToiStore::load(&path).unwrap();
        assert_eq!(reloaded.get("Total: 42 USD"), Some(&Toi::new("Total:", "")));

        // the on-disk record is a two-element array
        let raw = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["Total: 42 USD"][0], "Total:");
        assert_eq!(parsed["Total: 42 USD"][1], "");
    }
}
