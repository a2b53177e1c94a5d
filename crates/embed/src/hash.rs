use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimensions: 64,
            seed: 7919,
        }
    }
}

/// Deterministic local embedder for tests and offline runs. Tokens and their
/// character trigrams are hashed into buckets, so related word forms land on
/// overlapping coordinates and cosine similarity carries a weak lexical
/// signal instead of pure equality.
#[derive(Clone)]
pub struct HashEmbedder {
    config: HashEmbedderConfig,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        Self { config }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let dims = self.config.dimensions.max(1);
        let mut vector = vec![0f32; dims];
        for token in text.split_whitespace() {
            let lower = token.to_lowercase();
            vector[self.bucket(&lower)] += 1.0;
            let chars: Vec<char> = lower.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                vector[self.bucket(&gram)] += 0.5;
            }
        }
        normalize(&mut vector);
        vector
    }

    fn bucket(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.config.seed);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.config.dimensions.max(1)
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        assert_eq!(embedder.embed_text("total sum"), embedder.embed_text("total sum"));
    }

    #[test]
    fn embeddings_are_unit_length() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let v = embedder.embed_text("some words here");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn whitespace_only_text_embeds_to_zero() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let v = embedder.embed_text("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_trigrams_give_partial_overlap() {
        let embedder = HashEmbedder::new(HashEmbedderConfig {
            dimensions: 256,
            seed: 7919,
        });
        let a = embedder.embed_text("shipping");
        let b = embedder.embed_text("shipped");
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        assert!(dot > 0.0);
    }
}
