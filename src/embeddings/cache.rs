//! Content-addressed persistent embedding cache.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::{EmbeddingProvider, embed_in_batches};
use crate::types::RagError;

/// Persistent map from exact text content to its embedding vector.
///
/// Keys are SHA-256 digests of the raw text, so whitespace or casing
/// differences are different entries: text identity is content identity.
/// Entries are never evicted or expired: the embedding model is treated as
/// fixed for the lifetime of the store, so a stored vector stays correct.
///
/// Each batch operation acquires the backing sqlite store for the duration
/// of the call and releases it on every exit path. A store that cannot be
/// opened fails the operation; callers can always tell "cache unavailable"
/// ([`RagError::Cache`]) from "cache miss" (`Ok(None)`).
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    path: PathBuf,
}

impl EmbeddingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable cache key for `text`: lowercase hex SHA-256 of its bytes.
    pub fn cache_key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        let mut key = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(key, "{byte:02x}");
        }
        key
    }

    async fn open_store(&self) -> Result<Connection, RagError> {
        let conn = Connection::open(&self.path)
            .await
            .map_err(|err| RagError::Cache(format!("unable to open cache store: {err}")))?;
        let prepared = conn
            .call(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS embeddings (
                        key TEXT PRIMARY KEY,
                        vector TEXT NOT NULL
                    )",
                    [],
                )?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await;
        if let Err(err) = prepared {
            let _ = conn.close().await;
            return Err(RagError::Cache(format!("unable to open cache store: {err}")));
        }
        Ok(conn)
    }

    /// Looks up a single text. `Ok(None)` is a miss.
    pub async fn get(&self, text: &str) -> Result<Option<Vec<f32>>, RagError> {
        let mut found = self.get_many(&[text.to_string()]).await?;
        Ok(found.pop().flatten())
    }

    /// Looks up every text in one scoped store acquisition, preserving
    /// input order. Duplicate texts are looked up independently.
    pub async fn get_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|text| Self::cache_key(text)).collect();
        let conn = self.open_store().await?;
        let looked_up = conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT vector FROM embeddings WHERE key = ?")?;
                let mut rows = Vec::with_capacity(keys.len());
                for key in &keys {
                    let raw: Option<String> =
                        stmt.query_row([key], |row| row.get(0)).optional()?;
                    rows.push(raw);
                }
                Ok::<_, tokio_rusqlite::rusqlite::Error>(rows)
            })
            .await
            .map_err(|err| RagError::Cache(err.to_string()));
        let _ = conn.close().await;

        looked_up?
            .into_iter()
            .map(|raw| {
                raw.map(|raw| {
                    serde_json::from_str(&raw)
                        .map_err(|err| RagError::Cache(format!("corrupt cache entry: {err}")))
                })
                .transpose()
            })
            .collect()
    }

    /// Persists one entry per `(text, vector)` pair. The whole batch is one
    /// transaction, which also serializes concurrent writers on the store's
    /// own locking; re-setting an existing text overwrites its entry.
    pub async fn bulk_set(&self, texts: &[String], vectors: &[Vec<f32>]) -> Result<(), RagError> {
        if texts.len() != vectors.len() {
            return Err(RagError::Cache(format!(
                "bulk_set called with {} texts and {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        if texts.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(texts.len());
        for (text, vector) in texts.iter().zip(vectors) {
            let serialized = serde_json::to_string(vector)
                .map_err(|err| RagError::Cache(err.to_string()))?;
            rows.push((Self::cache_key(text), serialized));
        }

        let conn = self.open_store().await?;
        let written = conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx
                        .prepare("INSERT OR REPLACE INTO embeddings (key, vector) VALUES (?, ?)")?;
                    for (key, vector) in &rows {
                        stmt.execute([key, vector])?;
                    }
                }
                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .map_err(|err| RagError::Cache(err.to_string()));
        let _ = conn.close().await;
        written
    }
}

/// Outcome of a cache-aware embedding run.
#[derive(Clone, Debug)]
pub struct CachedEmbedOutcome {
    /// One vector per input text, aligned to input order.
    pub vectors: Vec<Vec<f32>>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

/// Embeds `texts`, consulting the cache first and calling `provider` only
/// for texts the cache does not hold.
///
/// Misses keep their original positions: they are embedded in original
/// relative order (in groups of at most `batch_size`), persisted, and then
/// merged back so `vectors[i]` always corresponds to `texts[i]` regardless
/// of the hit/miss mix. Each unique text is embedded at most once per store
/// lifetime; duplicates within one call resolve to the same key without
/// disturbing alignment.
pub async fn embed_with_cache(
    cache: &EmbeddingCache,
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<CachedEmbedOutcome, RagError> {
    if texts.is_empty() {
        return Ok(CachedEmbedOutcome {
            vectors: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
        });
    }

    let mut slots = cache.get_many(texts).await?;
    let missing: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.is_none().then_some(idx))
        .collect();
    let cache_misses = missing.len();
    let cache_hits = texts.len() - cache_misses;

    if !missing.is_empty() {
        let pending: Vec<String> = missing.iter().map(|&idx| texts[idx].clone()).collect();
        let fresh = embed_in_batches(provider, &pending, batch_size).await?;
        cache.bulk_set(&pending, &fresh).await?;
        for (&idx, vector) in missing.iter().zip(fresh) {
            slots[idx] = Some(vector);
        }
    }

    debug!(
        total = texts.len(),
        cache_hits, cache_misses, "embedded batch through cache"
    );

    let vectors = slots
        .into_iter()
        .map(|slot| slot.expect("every slot is filled by a hit or a fresh embedding"))
        .collect();
    Ok(CachedEmbedOutcome {
        vectors,
        cache_hits,
        cache_misses,
    })
}
