//! End-to-end pipeline tests with the mock embedding provider.
//!
//! These exercise ingest-then-retrieve against tempdir-backed sqlite stores,
//! suitable for CI and deterministic assertions on counts, metadata, and the
//! evidence digest.

use std::sync::Arc;

use tempfile::TempDir;

use ragline::{
    IngestReport, MockEmbeddingProvider, RagConfig, RagContext, RagError, ingest_json_file,
    retrieve,
};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("info")
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

struct TestHarness {
    // Held so the store files outlive the context.
    _dir: TempDir,
    ctx: RagContext,
    provider: Arc<MockEmbeddingProvider>,
}

fn make_harness() -> TestHarness {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = RagConfig {
        index_path: dir.path().join("index.sqlite"),
        cache_path: dir.path().join("embed_cache.sqlite"),
        ..RagConfig::default()
    };
    let provider = Arc::new(MockEmbeddingProvider::new());
    let ctx = RagContext::new(config, provider.clone()).unwrap();
    TestHarness {
        _dir: dir,
        ctx,
        provider,
    }
}

fn write_source(harness: &TestHarness, name: &str, json: &serde_json::Value) -> std::path::PathBuf {
    let path = harness._dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(json).unwrap()).unwrap();
    path
}

fn single_document() -> serde_json::Value {
    serde_json::json!([
        {
            "file_name": "episode_1.json",
            "content": {
                "title": "Chaos in Marketing",
                "overview": "O",
                "takeaway": "T",
                "podcast_details": {"guest": "G"},
                "key_insights": []
            }
        }
    ])
}

#[tokio::test]
async fn ingests_a_single_document_as_one_record() {
    let harness = make_harness();
    let path = write_source(&harness, "conversations.json", &single_document());

    let report = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert_eq!(
        report,
        IngestReport {
            documents_ingested: 1,
            documents_skipped: 0,
            chunks_written: 1,
            cache_hits: 0,
            cache_misses: 1,
        }
    );

    let index = harness.ctx.index().await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);

    let (hits, digest) = retrieve(&harness.ctx, "marketing chaos", 3, true)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    let hit = &hits[0];
    assert_eq!(hit.metadata.source_file, "episode_1.json");
    assert_eq!(hit.metadata.document_index, 0);
    assert_eq!(hit.metadata.chunk_index, 0);
    assert_eq!(
        hit.preview,
        "Title: Chaos in Marketing\nGuest: G\nOverview: O\nTakeaway: T"
    );
    assert_eq!(hit.metadata.preview, hit.preview);

    let digest = digest.unwrap();
    assert_eq!(digest.lines().count(), 1);
    assert!(digest.starts_with("- episode_1.json:idx0-chunk0: Title: Chaos in Marketing"));
    assert!(digest.ends_with(&format!("(score={:.4})", hit.score)));
}

#[tokio::test]
async fn skipped_documents_are_counted_not_fatal() {
    let harness = make_harness();
    let source = serde_json::json!([
        {"file_name": "broken.json"},
        {"file_name": "untitled.json", "content": {"title": ""}},
        {
            "file_name": "kept.json",
            "content": {"title": "The Only Valid One", "overview": "body"}
        }
    ]);
    let path = write_source(&harness, "conversations.json", &source);

    let report = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert_eq!(report.documents_ingested, 1);
    assert_eq!(report.documents_skipped, 2);
    assert_eq!(report.chunks_written, 1);

    let (hits, _) = retrieve(&harness.ctx, "valid", 5, false).await.unwrap();
    assert_eq!(hits.len(), 1);
    // Skipped items still advance the document index, so the kept document
    // keeps its position in the input list.
    assert_eq!(hits[0].metadata.document_index, 2);
    assert_eq!(hits[0].metadata.source_file, "kept.json");
}

#[tokio::test]
async fn all_skipped_input_writes_nothing() {
    let harness = make_harness();
    let source = serde_json::json!([
        {"content": {"overview": "no title here"}},
        {"file_name": "x.json"}
    ]);
    let path = write_source(&harness, "conversations.json", &source);

    let report = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert_eq!(report.chunks_written, 0);
    assert_eq!(report.documents_skipped, 2);
    assert_eq!(harness.provider.call_count(), 0);

    let index = harness.ctx.index().await.unwrap();
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn querying_an_empty_index_yields_empty_hits_and_empty_digest() {
    let harness = make_harness();

    let (hits, digest) = retrieve(&harness.ctx, "anything at all", 5, true)
        .await
        .unwrap();
    assert!(hits.is_empty());
    assert_eq!(digest, Some(String::new()));

    let (hits, digest) = retrieve(&harness.ctx, "anything at all", 5, false)
        .await
        .unwrap();
    assert!(hits.is_empty());
    assert_eq!(digest, None);
}

#[tokio::test]
async fn reingesting_the_same_file_embeds_from_cache() {
    let harness = make_harness();
    let path = write_source(&harness, "conversations.json", &single_document());

    let first = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert_eq!(first.cache_misses, 1);
    let model_calls_after_first = harness.provider.call_count();

    let second = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert_eq!(second.cache_hits, 1);
    assert_eq!(second.cache_misses, 0);
    assert_eq!(
        harness.provider.call_count(),
        model_calls_after_first,
        "re-ingestion must not reach the embedding model"
    );
}

#[tokio::test]
async fn long_documents_are_chunked_with_positions_and_previews() {
    let harness = make_harness();
    // ~1200 whitespace tokens flattens well past the 500-token window.
    let overview = (0..1200)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    let source = serde_json::json!([
        {
            "file_name": "long.json",
            "content": {"title": "A Long Conversation", "overview": overview}
        }
    ]);
    let path = write_source(&harness, "conversations.json", &source);

    let report = ingest_json_file(&harness.ctx, &path).await.unwrap();
    assert!(report.chunks_written > 1);

    let (hits, _) = retrieve(&harness.ctx, "word42", report.chunks_written, false)
        .await
        .unwrap();
    assert_eq!(hits.len(), report.chunks_written);

    let mut chunk_indexes: Vec<usize> =
        hits.iter().map(|hit| hit.metadata.chunk_index).collect();
    chunk_indexes.sort_unstable();
    let expected: Vec<usize> = (0..report.chunks_written).collect();
    assert_eq!(chunk_indexes, expected);

    for hit in &hits {
        assert!(hit.preview.chars().count() <= 512);
        assert_eq!(hit.metadata.source_file, "long.json");
        assert_eq!(hit.metadata.document_index, 0);
    }
}

#[tokio::test]
async fn hits_and_digest_follow_ascending_distance_order() {
    let harness = make_harness();
    let source = serde_json::json!([
        {"file_name": "a.json", "content": {"title": "Pricing strategies for early startups"}},
        {"file_name": "b.json", "content": {"title": "Fundraising and investor relations"}},
        {"file_name": "c.json", "content": {"title": "Hiring the first engineering team"}}
    ]);
    let path = write_source(&harness, "conversations.json", &source);
    ingest_json_file(&harness.ctx, &path).await.unwrap();

    let (hits, digest) = retrieve(&harness.ctx, "startup pricing", 3, true)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(
            pair[0].score <= pair[1].score,
            "hits must be ordered nearest first"
        );
    }

    let digest = digest.unwrap();
    assert_eq!(digest.lines().count(), 3);
    for (line, hit) in digest.lines().zip(&hits) {
        assert!(line.starts_with(&format!(
            "- {}:idx{}-chunk{}: ",
            hit.metadata.source_file, hit.metadata.document_index, hit.metadata.chunk_index
        )));
        assert!(line.ends_with(&format!("(score={:.4})", hit.score)));
    }
}

#[tokio::test]
async fn missing_source_file_is_a_configuration_error() {
    let harness = make_harness();
    let result = ingest_json_file(&harness.ctx, harness._dir.path().join("absent.json")).await;
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[tokio::test]
async fn unparseable_source_is_an_invalid_document_error() {
    let harness = make_harness();
    let path = harness._dir.path().join("garbage.json");
    std::fs::write(&path, "{not json").unwrap();
    let result = ingest_json_file(&harness.ctx, &path).await;
    assert!(matches!(result, Err(RagError::InvalidDocument(_))));
}

#[tokio::test]
async fn unavailable_embedding_model_fails_ingestion() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = RagConfig {
        index_path: dir.path().join("index.sqlite"),
        cache_path: dir.path().join("embed_cache.sqlite"),
        ..RagConfig::default()
    };
    let ctx = RagContext::new(config, Arc::new(MockEmbeddingProvider::failing())).unwrap();

    let path = dir.path().join("conversations.json");
    std::fs::write(&path, serde_json::to_string(&single_document()).unwrap()).unwrap();

    let result = ingest_json_file(&ctx, &path).await;
    assert!(matches!(result, Err(RagError::Embedding(_))));

    // Nothing must have been written on the failed run.
    let index = ctx.index().await.unwrap();
    assert_eq!(index.count().await.unwrap(), 0);
}
