//! Pipeline configuration.

use std::env;
use std::path::PathBuf;

use crate::stores::sqlite::validate_collection_name;
use crate::types::RagError;

/// Characters of chunk text stored as the record's document body. Text past
/// this point is not retrievable after ingestion.
pub const PREVIEW_MAX_CHARS: usize = 512;

/// Characters of preview rendered into each evidence digest line. Part of
/// the wire contract with the downstream agent layer.
pub const DIGEST_SNIPPET_MAX_CHARS: usize = 240;

/// Tunable parameters of the ingestion and retrieval pipeline.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Sqlite file backing the vector collection.
    pub index_path: PathBuf,
    /// Sqlite file backing the embedding cache.
    pub cache_path: PathBuf,
    /// Name of the vector collection (also the backing table name).
    pub collection: String,
    /// Maximum whitespace tokens per chunk.
    pub chunk_max_tokens: usize,
    /// Tokens shared between consecutive chunks.
    pub chunk_overlap_tokens: usize,
    /// Maximum texts per embedding model call.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./ragline_index.sqlite"),
            cache_path: PathBuf::from("./ragline_embed_cache.sqlite"),
            collection: "conversation_chunks".to_string(),
            chunk_max_tokens: 500,
            chunk_overlap_tokens: 100,
            embed_batch_size: 32,
        }
    }
}

impl RagConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// A `.env` file is loaded first when present; its absence is not an
    /// error. Recognized variables: `RAGLINE_INDEX_PATH`,
    /// `RAGLINE_CACHE_PATH`, `RAGLINE_COLLECTION`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(value) = env::var("RAGLINE_INDEX_PATH") {
            config.index_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("RAGLINE_CACHE_PATH") {
            config.cache_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("RAGLINE_COLLECTION") {
            config.collection = value;
        }
        config
    }

    /// Rejects parameter combinations that could not run: a chunk window
    /// that cannot advance, an empty embedding batch, or a collection name
    /// that is not a bare identifier.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_max_tokens == 0 {
            return Err(RagError::Config("chunk_max_tokens must be positive".into()));
        }
        if self.chunk_overlap_tokens >= self.chunk_max_tokens {
            return Err(RagError::Config(format!(
                "chunk_overlap_tokens ({}) must be smaller than chunk_max_tokens ({})",
                self.chunk_overlap_tokens, self.chunk_max_tokens
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be positive".into()));
        }
        validate_collection_name(&self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RagConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config = RagConfig {
            chunk_overlap_tokens: 500,
            ..RagConfig::default()
        };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn batch_size_must_be_positive() {
        let config = RagConfig {
            embed_batch_size: 0,
            ..RagConfig::default()
        };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn collection_name_must_be_an_identifier() {
        let config = RagConfig {
            collection: "chunks; drop table chunks".to_string(),
            ..RagConfig::default()
        };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }
}
