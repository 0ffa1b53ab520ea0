//! Deterministic stand-ins for the model service used by unit tests

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use anyhow::Result;

use crate::RagError;
use crate::embeddings::{Embedder, Generator};

/// Bag-of-words embedding: each lowercase alphanumeric word is hashed into
/// one of `dimension` buckets and the vector is L2-normalised.
pub struct HashEmbedder {
    pub dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn model(&self) -> &str {
        "hash-embedder"
    }
}

/// Embedder whose every call fails as an unreachable service would
pub struct UnreachableEmbedder;

impl Embedder for UnreachableEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Service("connection refused".to_string()).into())
    }

    fn model(&self) -> &str {
        "unreachable"
    }
}

/// Generator returning a fixed response and recording its prompts
pub struct ScriptedGenerator {
    response: Option<String>,
    calls: Mutex<Vec<(String, Option<u32>)>>,
}

impl ScriptedGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Option<u32>)> {
        self.calls.lock().expect("lock is not poisoned").clone()
    }

    fn respond(&self, prompt: &str, limit: Option<u32>) -> Result<String> {
        self.calls
            .lock()
            .expect("lock is not poisoned")
            .push((prompt.to_string(), limit));

        self.response
            .clone()
            .ok_or_else(|| RagError::Service("generation failed".to_string()).into())
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.respond(prompt, None)
    }

    fn generate_with_limit(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.respond(prompt, Some(max_tokens))
    }
}
