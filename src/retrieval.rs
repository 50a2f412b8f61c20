//! Query-time retrieval and evidence digest assembly.

use tracing::debug;

use crate::config::DIGEST_SNIPPET_MAX_CHARS;
use crate::context::RagContext;
use crate::stores::{ChunkMetadata, QueryResult};
use crate::types::RagError;

/// One nearest-neighbor match, in the store's similarity order.
#[derive(Clone, Debug)]
pub struct RetrievalHit {
    pub id: String,
    /// Stored preview of the chunk (the record's document body).
    pub preview: String,
    pub metadata: ChunkMetadata,
    /// Similarity distance; lower is more similar.
    pub score: f32,
}

/// Embeds `query`, fetches the `k` nearest chunks, and assembles hits plus
/// an optional evidence digest.
///
/// Query text is effectively unique per call, so it goes straight to the
/// provider instead of through the cache. When a digest is requested and
/// nothing matches, the digest is an empty string rather than `None`.
pub async fn retrieve(
    ctx: &RagContext,
    query: &str,
    k: usize,
    want_digest: bool,
) -> Result<(Vec<RetrievalHit>, Option<String>), RagError> {
    let query_texts = vec![query.to_string()];
    let mut vectors = ctx.provider().embed_batch(&query_texts).await?;
    if vectors.len() != 1 {
        return Err(RagError::Embedding(format!(
            "provider '{}' returned {} vectors for a single query",
            ctx.provider().name(),
            vectors.len()
        )));
    }
    let embedding = vectors.remove(0);

    let index = ctx.index().await?;
    let QueryResult {
        ids,
        metadatas,
        distances,
        documents,
    } = index.query(&embedding, k).await?;

    let hits: Vec<RetrievalHit> = ids
        .into_iter()
        .zip(metadatas)
        .zip(distances)
        .zip(documents)
        .map(|(((id, metadata), score), preview)| RetrievalHit {
            id,
            preview,
            metadata,
            score,
        })
        .collect();

    debug!(hits = hits.len(), k, "retrieved nearest chunks");

    let digest = want_digest.then(|| format_digest(&hits));
    Ok((hits, digest))
}

/// Formats hits into the evidence digest consumed by the agent layer.
///
/// One line per hit, nearest first:
/// `- <source_file>:idx<document_index>-chunk<chunk_index>: <snippet> (score=<distance>)`
/// with the snippet capped at 240 characters and newlines collapsed to
/// spaces, and the score printed to four decimal places. The exact format
/// is a wire contract: downstream prompt text depends on it.
pub fn format_digest(hits: &[RetrievalHit]) -> String {
    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            let snippet = hit
                .preview
                .chars()
                .take(DIGEST_SNIPPET_MAX_CHARS)
                .collect::<String>()
                .replace('\n', " ");
            format!(
                "- {}:idx{}-chunk{}: {} (score={:.4})",
                hit.metadata.source_file,
                hit.metadata.document_index,
                hit.metadata.chunk_index,
                snippet,
                hit.score
            )
        })
        .collect();
    lines.join("\n")
}
