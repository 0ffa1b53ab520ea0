// LanceDB vector database module
// Handles chunk storage and nearest-neighbor search over embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::VectorStore;

/// A chunk row; `(document_id, text)` identifies it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Source document, usually the file path
    pub document_id: String,
    /// Stored (possibly annotated) chunk text
    pub text: String,
    /// Embedding of the chunk, `embedding_dim` long
    pub vector: Vec<f32>,
}

/// A nearest-neighbor hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub document_id: String,
    pub text: String,
    /// L2 distance reported by the store
    pub distance: f32,
}

/// Outcome of rebuilding the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// An ANN index now covers the vector column
    Built,
    /// Too few rows to train an index; searches scan the table exactly
    SkippedTooFewRows(usize),
}
