// Retrieval module
// Query embedding, nearest-neighbor lookup and grounded answer generation

pub mod prompt;


use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::database::{Neighbor, VectorStore};
use crate::embeddings::{Embedder, Generator, ensure_dimension};

pub use prompt::{raw_prompt, synthesize};

/// Finds the stored chunks closest to a query.
///
/// The embedder must be the model the store was filled with; only the
/// vector width can be checked here.
pub struct Retriever<'a, E> {
    embedder: &'a E,
    store: &'a VectorStore,
    embedding_dimension: usize,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, store: &'a VectorStore, embedding_dimension: usize) -> Self {
        Self {
            embedder,
            store,
            embedding_dimension,
        }
    }

    /// Up to `k` chunks, nearest first
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        debug!("Embedding query with {}", self.embedder.model());

        let vector = self
            .embedder
            .embed(query)
            .context("Failed to embed query")?;
        ensure_dimension(&vector, self.embedding_dimension)?;

        let neighbors = self
            .store
            .nearest_neighbors(&vector, k)
            .await
            .context("Nearest-neighbor query failed")?;

        info!("Retrieved {} chunks for query", neighbors.len());
        Ok(neighbors)
    }
}

/// Result of answering one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Retrieved chunks, nearest first
    pub chunks: Vec<Neighbor>,
    /// Grounded prompt sent to the generator
    pub prompt: String,
    pub answer: String,
    /// Answer to the bare query, when requested
    pub raw_answer: Option<String>,
}

/// Retrieve `k` chunks, generate a grounded answer and optionally a raw one
#[inline]
pub async fn answer_query<E, G>(
    retriever: &Retriever<'_, E>,
    generator: &G,
    query: &str,
    k: usize,
    raw: bool,
) -> Result<QueryOutcome>
where
    E: Embedder,
    G: Generator,
{
    let chunks = retriever.retrieve(query, k).await?;
    let prompt = synthesize(query, chunks.iter().map(|chunk| chunk.text.as_str()));

    let answer = generator
        .generate(&prompt)
        .context("Failed to generate grounded answer")?;

    let raw_answer = if raw {
        Some(
            generator
                .generate(&raw_prompt(query))
                .context("Failed to generate raw answer")?,
        )
    } else {
        None
    };

    Ok(QueryOutcome {
        chunks,
        prompt,
        answer,
        raw_answer,
    })
}
