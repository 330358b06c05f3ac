//! Index persistence
//!
//! An index is stored as two paired artifacts:
//! - a little-endian vector blob: magic `TSVAIDX2`, `u32` dimension,
//!   `u64` count, the SHA-256 of the metadata file, then
//!   `count * dimension` `f32` values
//! - a JSON array of caption records, in the same order
//!
//! Both are written together and must be read together. A metadata file
//! whose digest differs from the one in the blob header belongs to another
//! build and is rejected on load, as is a pair whose counts disagree.

use crate::{FlatIndex, IndexEntry, VectorStore};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tsva_core::{CaptionRecord, Result, TsvaError};

const MAGIC: &[u8; 8] = b"TSVAIDX2";
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 4 + 8 + DIGEST_LEN;

/// Locations of the two index artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn new(vectors: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            vectors: vectors.into(),
            metadata: metadata.into(),
        }
    }

    /// Both artifacts are present on disk
    pub fn exists(&self) -> bool {
        self.vectors.is_file() && self.metadata.is_file()
    }
}

impl Default for IndexPaths {
    fn default() -> Self {
        Self::new("captions.index", "metadata.json")
    }
}

/// Write the vector blob and the metadata list
pub fn save_index(index: &FlatIndex, paths: &IndexPaths) -> Result<()> {
    let records: Vec<&CaptionRecord> = index.records().collect();
    let metadata = serde_json::to_vec_pretty(&records)
        .map_err(|e| TsvaError::SerializationError(e.to_string()))?;
    let blob = encode_vectors(index, &metadata_digest(&metadata))?;

    write_replace(&paths.vectors, &blob)?;
    write_replace(&paths.metadata, &metadata)?;

    tracing::debug!(
        vectors = %paths.vectors.display(),
        metadata = %paths.metadata.display(),
        count = index.len(),
        "Index artifacts written"
    );
    Ok(())
}

/// Read both artifacts and rebuild the index
pub fn load_index(paths: &IndexPaths) -> Result<FlatIndex> {
    let blob = std::fs::read(&paths.vectors).map_err(|e| TsvaError::io(&paths.vectors, e))?;
    let decoded = decode_vectors(&blob)?;

    let metadata =
        std::fs::read(&paths.metadata).map_err(|e| TsvaError::io(&paths.metadata, e))?;
    if metadata_digest(&metadata) != decoded.metadata_digest {
        return Err(TsvaError::DataIntegrity(format!(
            "Metadata file {} does not belong to vector index {}",
            paths.metadata.display(),
            paths.vectors.display()
        )));
    }

    let records: Vec<CaptionRecord> = serde_json::from_slice(&metadata).map_err(|e| {
        TsvaError::SerializationError(format!(
            "Invalid metadata file {}: {e}",
            paths.metadata.display()
        ))
    })?;

    if records.len() != decoded.vectors.len() {
        return Err(TsvaError::DataIntegrity(format!(
            "Metadata has {} records but the vector index has {} vectors",
            records.len(),
            decoded.vectors.len()
        )));
    }

    let entries = records
        .into_iter()
        .zip(decoded.vectors)
        .map(|(record, vector)| IndexEntry::new(record, vector))
        .collect();

    FlatIndex::with_dimension(decoded.dimension, entries)
}

struct DecodedBlob {
    dimension: usize,
    metadata_digest: [u8; DIGEST_LEN],
    vectors: Vec<Vec<f32>>,
}

fn metadata_digest(metadata: &[u8]) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&Sha256::digest(metadata));
    digest
}

fn encode_vectors(index: &FlatIndex, metadata_digest: &[u8; DIGEST_LEN]) -> Result<Vec<u8>> {
    let dimension = u32::try_from(index.dimension()).map_err(|_| {
        TsvaError::DataIntegrity(format!("Dimension {} too large", index.dimension()))
    })?;

    let mut blob = Vec::with_capacity(HEADER_LEN + index.len() * index.dimension() * 4);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&dimension.to_le_bytes());
    blob.extend_from_slice(&(index.len() as u64).to_le_bytes());
    blob.extend_from_slice(metadata_digest);
    for entry in index.entries() {
        for value in &entry.vector {
            blob.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(blob)
}

fn decode_vectors(blob: &[u8]) -> Result<DecodedBlob> {
    if blob.len() < HEADER_LEN {
        return Err(TsvaError::DataIntegrity(
            "Vector index is truncated".to_string(),
        ));
    }

    let (magic, rest) = blob.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(TsvaError::DataIntegrity(
            "Vector index has an unknown format".to_string(),
        ));
    }

    let (dimension, rest) = rest.split_at(4);
    let (count, rest) = rest.split_at(8);
    let (digest, payload) = rest.split_at(DIGEST_LEN);
    let dimension = u32::from_le_bytes([dimension[0], dimension[1], dimension[2], dimension[3]])
        as usize;
    let count = u64::from_le_bytes([
        count[0], count[1], count[2], count[3], count[4], count[5], count[6], count[7],
    ]);

    let count = usize::try_from(count)
        .map_err(|_| TsvaError::DataIntegrity(format!("Vector count {count} too large")))?;

    if dimension == 0 && count > 0 {
        return Err(TsvaError::DataIntegrity(
            "Vector index declares zero-length vectors".to_string(),
        ));
    }

    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| TsvaError::DataIntegrity("Vector index size overflows".to_string()))?;

    if payload.len() != expected {
        return Err(TsvaError::DataIntegrity(format!(
            "Vector index payload is {} bytes, expected {expected} for {count} x {dimension}",
            payload.len()
        )));
    }

    let vectors = if dimension == 0 {
        Vec::new()
    } else {
        payload
            .chunks_exact(dimension * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect()
    };

    let mut metadata_digest = [0u8; DIGEST_LEN];
    metadata_digest.copy_from_slice(digest);

    Ok(DecodedBlob {
        dimension,
        metadata_digest,
        vectors,
    })
}

/// Write to a sibling temp file, then rename over the target
fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TsvaError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes).map_err(|e| TsvaError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| TsvaError::io(path, e))
}
