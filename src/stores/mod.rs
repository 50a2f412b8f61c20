//! Vector index storage for chunk records.

pub mod sqlite;

use serde::{Deserialize, Serialize};

pub use sqlite::SqliteVectorIndex;

/// Metadata persisted alongside every indexed chunk.
///
/// A fixed record rather than a free-form map, so field names are checked
/// at compile time. It serializes to the JSON shape stored in the
/// collection's metadata column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating source identifier, usually a file name.
    pub source_file: String,
    /// Position of the source document in the ingested input list.
    pub document_index: usize,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// First 512 characters of the chunk text.
    pub preview: String,
}

/// Parallel result sequences of one nearest-neighbor query, ordered by
/// ascending distance (nearest first).
#[derive(Clone, Debug, Default)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub documents: Vec<String>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
