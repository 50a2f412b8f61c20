//! End-to-end ingestion: read, flatten, chunk, embed, upsert.

use std::path::Path;
use std::time::Instant;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use super::source::SourceItem;
use crate::chunker::chunk_text;
use crate::config::PREVIEW_MAX_CHARS;
use crate::context::RagContext;
use crate::embeddings::embed_with_cache;
use crate::stores::ChunkMetadata;
use crate::types::RagError;

/// Summary of one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents that were flattened, chunked, and written.
    pub documents_ingested: usize,
    /// Documents skipped for lacking a title. A documented filter, not an
    /// error.
    pub documents_skipped: usize,
    /// Chunk records upserted into the collection.
    pub chunks_written: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

/// Reads the JSON document set at `path`, chunks and embeds every qualifying
/// document, and upserts the chunks into the collection.
///
/// Each stored record carries a fresh uuid, the source file name, the
/// document's position in the input list, the chunk's position within its
/// document, and the first 512 characters of the chunk as both metadata
/// preview and document body. A run that yields no chunks writes nothing
/// and reports zero. Re-running the same file upserts equivalent content
/// under new ids and embeds entirely from the cache.
pub async fn ingest_json_file(
    ctx: &RagContext,
    path: impl AsRef<Path>,
) -> Result<IngestReport, RagError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RagError::Config(format!(
            "source file not found: {}",
            path.display()
        )));
    }

    let started = Instant::now();
    let raw = fs::read_to_string(path).await?;
    let items: Vec<SourceItem> = serde_json::from_str(&raw)
        .map_err(|err| RagError::InvalidDocument(format!("{}: {err}", path.display())))?;

    let config = ctx.config();
    let mut report = IngestReport::default();
    let mut chunk_texts: Vec<String> = Vec::new();
    let mut chunk_origins: Vec<(String, usize, usize)> = Vec::new();

    for (document_index, item) in items.iter().enumerate() {
        let Some(content) = item
            .content
            .as_ref()
            .filter(|content| !content.title.is_empty())
        else {
            report.documents_skipped += 1;
            debug!(document_index, "skipping document without a title");
            continue;
        };

        let body = content.flatten();
        let chunks = chunk_text(&body, config.chunk_max_tokens, config.chunk_overlap_tokens)?;
        let source_file = item
            .file_name
            .clone()
            .unwrap_or_else(|| path.display().to_string());

        report.documents_ingested += 1;
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            chunk_origins.push((source_file.clone(), document_index, chunk_index));
            chunk_texts.push(chunk);
        }
    }

    if chunk_texts.is_empty() {
        info!(
            skipped = report.documents_skipped,
            "no qualifying documents; nothing ingested"
        );
        return Ok(report);
    }

    let outcome = embed_with_cache(
        ctx.cache(),
        ctx.provider().as_ref(),
        &chunk_texts,
        config.embed_batch_size,
    )
    .await?;
    report.cache_hits = outcome.cache_hits;
    report.cache_misses = outcome.cache_misses;

    let ids: Vec<String> = chunk_texts
        .iter()
        .map(|_| Uuid::new_v4().to_string())
        .collect();
    let documents: Vec<String> = chunk_texts
        .iter()
        .map(|chunk| chunk.chars().take(PREVIEW_MAX_CHARS).collect())
        .collect();
    let metadatas: Vec<ChunkMetadata> = chunk_origins
        .into_iter()
        .zip(&documents)
        .map(
            |((source_file, document_index, chunk_index), preview)| ChunkMetadata {
                source_file,
                document_index,
                chunk_index,
                preview: preview.clone(),
            },
        )
        .collect();

    report.chunks_written = ids.len();
    let index = ctx.index().await?;
    index
        .upsert(ids, outcome.vectors, metadatas, documents)
        .await?;

    info!(
        chunks = report.chunks_written,
        documents = report.documents_ingested,
        skipped = report.documents_skipped,
        cache_hits = report.cache_hits,
        cache_misses = report.cache_misses,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingested document set"
    );
    Ok(report)
}
