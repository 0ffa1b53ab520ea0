// Database module
// LanceDB-backed chunk table with vector search

pub mod lancedb;

pub use self::lancedb::{ChunkRecord, IndexState, Neighbor, VectorStore};
