//! TSVA Vector - Caption embeddings and nearest-neighbor index
//!
//! Provides the embedding clients that turn caption text into vectors,
//! an exact (flat) Euclidean nearest-neighbor index over those vectors,
//! and persistence of the index as a pair of artifacts.

use tsva_core::{CaptionRecord, Result};

pub mod embedding;
pub mod flat_store;
pub mod persist;

pub use embedding::{
    create_embedding_client, EmbeddingClient, HashingEmbedding, OllamaEmbedding, OpenAiEmbedding,
};
pub use flat_store::FlatIndex;
pub use persist::{load_index, save_index, IndexPaths};

/// A caption record together with its embedding
///
/// The vector and its metadata travel as one value so the two can never be
/// reordered independently.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub record: CaptionRecord,
    pub vector: Vec<f32>,
}

impl IndexEntry {
    pub fn new(record: CaptionRecord, vector: Vec<f32>) -> Self {
        Self { record, vector }
    }
}

/// A search hit with its Euclidean distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CaptionRecord,
    /// Euclidean (L2) distance, lower is closer
    pub distance: f32,
}

/// Trait for vector index operations
pub trait VectorStore: Send + Sync {
    /// Return up to `limit` entries nearest to `query_vector`, nearest first
    fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredRecord>>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, zero for an index built from nothing
    fn dimension(&self) -> usize;
}
