mod cache;
mod hash;
mod openai;
mod provider;

pub use cache::{EmbeddingCache, EmbeddingEngine};
pub use hash::{HashEmbedder, HashEmbedderConfig};
pub use openai::OpenAiEmbeddingClient;
pub use provider::{EmbeddingBackend, EmbeddingClient};
