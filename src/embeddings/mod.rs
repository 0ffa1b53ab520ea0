// Embeddings module
// Model-service seams (embedding and generation), Ollama integration and content chunking

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_text};
pub use ollama::OllamaClient;

use crate::RagError;

/// Maps text to a fixed-length vector
pub trait Embedder {
    /// Embed `text` with the configured embedding model
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Name of the embedding model, for logging
    fn model(&self) -> &str;
}

/// Produces free text from a prompt
pub trait Generator {
    /// Generate a completion using the configured output limit
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Generate a completion capped at `max_tokens` output tokens
    fn generate_with_limit(&self, prompt: &str, max_tokens: u32) -> anyhow::Result<String>;
}

/// Reject vectors whose length disagrees with the configured dimension
#[inline]
pub fn ensure_dimension(vector: &[f32], expected: usize) -> Result<(), RagError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(RagError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}
