//! Embedding providers and cache-aware batch embedding.
//!
//! * [`EmbeddingProvider`] — the batch text-to-vector boundary.
//! * [`http`] — provider backed by an OpenAI-compatible HTTP endpoint.
//! * [`cache`] — content-addressed persistent cache and the
//!   [`embed_with_cache`] orchestration that sits in front of a provider.

pub mod cache;
pub mod http;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::types::RagError;

pub use cache::{CachedEmbedOutcome, EmbeddingCache, embed_with_cache};
pub use http::HttpEmbeddingProvider;

/// Batch text-to-vector model.
///
/// Implementations return exactly one vector per input text, in input order,
/// with a fixed dimensionality for the lifetime of the provider. A provider
/// that cannot reach its model fails the call; it never substitutes
/// degenerate vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name used in logs and error messages.
    fn name(&self) -> &str;

    /// Embeds every text in `texts`, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Embeds `texts` in groups of at most `batch_size`, concatenating the
/// results in input order. Bounds the size of each model call without
/// changing the output alignment.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    if batch_size == 0 {
        return Err(RagError::Config("embed_batch_size must be positive".into()));
    }

    let mut vectors = Vec::with_capacity(texts.len());
    for group in texts.chunks(batch_size) {
        let mut batch = provider.embed_batch(group).await?;
        if batch.len() != group.len() {
            return Err(RagError::Embedding(format!(
                "provider '{}' returned {} vectors for {} inputs",
                provider.name(),
                batch.len(),
                group.len()
            )));
        }
        vectors.append(&mut batch);
    }
    Ok(vectors)
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text, so identical text
/// always yields the identical vector. The provider counts `embed_batch`
/// invocations, which lets tests assert that a warmed cache performs no
/// model calls at all.
pub struct MockEmbeddingProvider {
    dims: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dims(8)
    }

    pub fn with_dims(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A provider whose model is permanently unavailable.
    pub fn failing() -> Self {
        Self {
            dims: 8,
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of `embed_batch` calls that reached the model.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dims)
            .map(|i| {
                let bits = seed.rotate_left((i as u32 % 63) * 8) ^ ((i as u64) << 24);
                ((bits >> 32) as f32) / (u32::MAX as f32)
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if self.fail {
            return Err(RagError::Embedding(
                "mock provider configured as unavailable".into(),
            ));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
