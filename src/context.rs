//! Shared application context for the pipeline.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::RagConfig;
use crate::embeddings::{EmbeddingCache, EmbeddingProvider};
use crate::stores::SqliteVectorIndex;
use crate::types::RagError;

/// Process-wide handles shared by ingestion and retrieval.
///
/// Construct one at startup and pass it by reference. The vector collection
/// is opened lazily on first use and then reused for the lifetime of the
/// context; concurrent first callers await a single initialization instead
/// of each opening their own handle.
pub struct RagContext {
    config: RagConfig,
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    index: OnceCell<Arc<SqliteVectorIndex>>,
}

impl RagContext {
    /// Validates `config` and builds the context. Invalid chunking or
    /// batching parameters fail here, before any work starts.
    pub fn new(
        config: RagConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let cache = EmbeddingCache::new(&config.cache_path);
        Ok(Self {
            config,
            provider,
            cache,
            index: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// The collection handle, opened exactly once per context.
    pub async fn index(&self) -> Result<&Arc<SqliteVectorIndex>, RagError> {
        self.index
            .get_or_try_init(|| async {
                let index =
                    SqliteVectorIndex::open(&self.config.index_path, &self.config.collection)
                        .await?;
                Ok(Arc::new(index))
            })
            .await
    }
}
