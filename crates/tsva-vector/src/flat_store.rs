//! Flat (brute-force) vector index
//!
//! Exact k-nearest-neighbor search by Euclidean distance over every stored
//! vector. Entries are only ever added by a full build.

use crate::{IndexEntry, ScoredRecord, VectorStore};
use tsva_core::{CaptionRecord, Result, TsvaError};

/// In-memory flat index of caption embeddings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    /// Build an index from entries, taking the dimension from the first one
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimension = entries.first().map_or(0, |e| e.vector.len());
        Self::with_dimension(dimension, entries)
    }

    /// Build an index whose entries must all have `dimension` components
    pub fn with_dimension(dimension: usize, entries: Vec<IndexEntry>) -> Result<Self> {
        if !entries.is_empty() && dimension == 0 {
            return Err(TsvaError::DataIntegrity(
                "Cannot index zero-length vectors".to_string(),
            ));
        }

        if let Some((position, entry)) = entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.vector.len() != dimension)
        {
            return Err(TsvaError::DataIntegrity(format!(
                "Vector {position} ({}) has dimension {}, expected {dimension}",
                entry.record.image_id(),
                entry.vector.len()
            )));
        }

        Ok(Self { dimension, entries })
    }

    /// Pair records with their vectors by position
    pub fn from_parts(records: Vec<CaptionRecord>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if records.len() != vectors.len() {
            return Err(TsvaError::DataIntegrity(format!(
                "{} records but {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        let entries = records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| IndexEntry::new(record, vector))
            .collect();

        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Records in index order
    pub fn records(&self) -> impl Iterator<Item = &CaptionRecord> {
        self.entries.iter().map(|e| &e.record)
    }
}

impl VectorStore for FlatIndex {
    fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        if limit == 0 {
            return Err(TsvaError::ValidationError(
                "top_k must be at least 1".to_string(),
            ));
        }

        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(TsvaError::ValidationError(format!(
                "Query vector has dimension {}, index expects {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, squared_l2(query_vector, &e.vector)))
            .collect();

        // Stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(i, d)| ScoredRecord {
                record: self.entries[i].record.clone(),
                distance: d.sqrt(),
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Squared Euclidean distance between two equal-length vectors
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
