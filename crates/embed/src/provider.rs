use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::env;

use crate::hash::{HashEmbedder, HashEmbedderConfig};
use crate::openai::OpenAiEmbeddingClient;

/// Word boundary used for word-level embeddings: runs of non-word characters.
static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("word boundary"));

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

/// Embedding provider collaborator. Deterministic for a given text under a
/// fixed backend and model; callers cache results indefinitely.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    pub fn from_env() -> Result<Self> {
        match env::var("SPANLEARN_EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "hash".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => {
                let model = env::var("SPANLEARN_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string());
                Ok(Self {
                    backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(&model)?),
                })
            }
            _ => {
                let dims = env::var("SPANLEARN_HASH_DIMENSIONS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(64);
                Ok(Self {
                    backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig {
                        dimensions: dims,
                        ..HashEmbedderConfig::default()
                    })),
                })
            }
        }
    }

    pub fn hash() -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig::default())),
        }
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => Ok(inputs
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect()),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(inputs),
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs)?;
        Ok(output.pop().unwrap_or_default())
    }

    /// Per-word embeddings of `text`, keyed by token, tokenizing on runs of
    /// non-word characters.
    pub fn word_embeddings(&self, text: &str) -> Result<FxHashMap<String, Vec<f32>>> {
        let tokens: Vec<String> = WORD_BOUNDARY
            .split(text)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let vectors = self.embed_batch(&tokens)?;
        Ok(tokens.into_iter().zip(vectors).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_embeddings_split_on_non_word_runs() {
        let client = EmbeddingClient::hash();
        let words = client.word_embeddings("Total: 42, done").unwrap();
        assert!(words.contains_key("Total"));
        assert!(words.contains_key("42"));
        assert!(words.contains_key("done"));
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn embed_matches_batch() {
        let client = EmbeddingClient::hash();
        let single = client.embed("grand total").unwrap();
        let batch = client.embed_batch(&["grand total".to_string()]).unwrap();
        assert_eq!(single, batch[0]);
    }
}
