use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{LearnError, Result};

const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "at", "the", "and", "it", "for", "or", "of", "but", "in", "my", "your", "our",
    "their", "from", "than", "to", "towards", "by", "very", "much", "is", "are", "be", "must",
    "should", "shall", "i", "me", "she", "her", "he", "him",
];

/// Learner parameters. The stop-word penalty inflates (worsens) similarity
/// scores involving stop words and must stay at or above 1.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearnConfig {
    pub stopword_penalty: f32,
    pub max_candidates: usize,
    pub stop_words: Vec<String>,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            stopword_penalty: 1.25,
            max_candidates: 3,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LearnConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(penalty) = env::var("SPANLEARN_STOPWORD_PENALTY")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
        {
            config.stopword_penalty = penalty.max(1.0);
        }
        if let Some(max) = env::var("SPANLEARN_MAX_CANDIDATES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.max_candidates = max.max(1);
        }
        config
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            fs::read_to_string(path).map_err(|_| LearnError::ConfigFile(path.to_path_buf()))?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        let lowered = word.to_lowercase();
        self.stop_words.iter().any(|s| *s == lowered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_learner() {
        let config = LearnConfig::default();
        assert_eq!(config.stopword_penalty, 1.25);
        assert_eq!(config.max_candidates, 3);
        assert!(config.is_stop_word("the"));
        assert!(config.is_stop_word("The"));
        assert!(!config.is_stop_word("total"));
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learn.toml");
        fs::write(&path, "stopword_penalty = 1.5\nmax_candidates = 2\n").unwrap();
        let config = LearnConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.stopword_penalty, 1.5);
        assert_eq!(config.max_candidates, 2);
        // unset fields keep their defaults
        assert!(config.is_stop_word("the"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(LearnConfig::from_toml_file("/nonexistent/learn.toml").is_err());
    }
}
