//! Ingestion of structured document sets into the vector index.
//!
//! * [`source`] — serde model of the input JSON and body flattening.
//! * [`pipeline`] — the end-to-end chunk, embed, and upsert pipeline.

pub mod pipeline;
pub mod source;

pub use pipeline::{IngestReport, ingest_json_file};
pub use source::{KeyInsight, PodcastDetails, SourceContent, SourceItem};
