//! ```text
//! Source JSON ──► ingestion::ingest_json_file ──► chunker::chunk_text
//!                                   │
//!                                   ├─► embeddings::embed_with_cache ──► EmbeddingCache
//!                                   │                    └─► EmbeddingProvider (HTTP / mock)
//!                                   └─► stores::SqliteVectorIndex (upsert)
//!
//! Query ──► retrieval::retrieve ──► EmbeddingProvider
//!                     └─► SqliteVectorIndex (nearest neighbors)
//!                                   └─► RetrievalHit list + evidence digest
//! ```
//!
//! The agent layer that consumes the evidence digest, the HTTP front end,
//! and the LLM calls all live outside this crate; `RagContext` is the
//! handle they share.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod ingestion;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chunker::chunk_text;
pub use config::RagConfig;
pub use context::RagContext;
pub use embeddings::{
    CachedEmbedOutcome, EmbeddingCache, EmbeddingProvider, HttpEmbeddingProvider,
    MockEmbeddingProvider, embed_with_cache,
};
pub use ingestion::{IngestReport, ingest_json_file};
pub use retrieval::{RetrievalHit, format_digest, retrieve};
pub use stores::{ChunkMetadata, QueryResult, SqliteVectorIndex};
pub use types::RagError;
