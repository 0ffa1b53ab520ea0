//! Shared doubles for the integration tests: a hashing embedder and a mock Ollama server

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use localrag::config::{Config, OllamaConfig};
use localrag::embeddings::{ChunkingConfig, Embedder, Generator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const EMBEDDING_MODEL: &str = "all-minilm:22m";
pub const LLM_MODEL: &str = "smollm";
pub const ANSWER: &str = "Adam's last name is Green.";
pub const TOPICS: &str = r#"["people", "colors"]"#;

/// Deterministic bag-of-words embedding, L2-normalised
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % dimension as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

pub struct HashEmbedder(pub usize);

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(hash_embedding(text, self.0))
    }

    fn model(&self) -> &str {
        "hash-embedder"
    }
}

/// Generator that must never be called
pub struct NoGenerator;

impl Generator for NoGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("unexpected generation for prompt {:?}", prompt)
    }

    fn generate_with_limit(&self, prompt: &str, _max_tokens: u32) -> anyhow::Result<String> {
        self.generate(prompt)
    }
}

struct EmbedResponder {
    dimension: usize,
}

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let input = body["input"].as_str().unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": body["model"],
            "embeddings": [hash_embedding(input, self.dimension)]
        }))
    }
}

struct GenerateResponder;

impl Respond for GenerateResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let prompt = body["prompt"].as_str().unwrap_or_default();
        let response = if prompt.starts_with("Task: Create a list of topics") {
            TOPICS
        } else {
            ANSWER
        };

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": body["model"],
            "response": response,
            "done": true
        }))
    }
}

/// Mock Ollama answering embed, generate and tags requests
pub async fn mock_ollama(dimension: usize) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder { dimension })
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(GenerateResponder)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                { "name": EMBEDDING_MODEL },
                { "name": format!("{}:latest", LLM_MODEL) }
            ]
        })))
        .mount(&server)
        .await;

    server
}

/// Configuration pointing at `server`, storing under `base_dir`
pub fn config_for(server: &MockServer, base_dir: &std::path::Path, dimension: usize) -> Config {
    let address = server.address();
    Config {
        ollama: OllamaConfig {
            host: address.ip().to_string(),
            port: address.port(),
            embedding_model: EMBEDDING_MODEL.to_string(),
            embedding_dimension: dimension,
            llm_model: LLM_MODEL.to_string(),
            timeout_seconds: 10,
            ..OllamaConfig::default()
        },
        chunking: ChunkingConfig {
            chunk_size: 10,
            overlap_fraction: 0.1,
        },
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    }
}
