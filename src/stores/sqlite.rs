//! Sqlite-backed vector collection using the sqlite-vec extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::debug;

use super::{ChunkMetadata, QueryResult};
use crate::types::RagError;

/// Owns one named collection inside a sqlite-vec database.
///
/// Chunk rows live in the `<collection>` table; their embeddings live in the
/// `<collection>_embeddings` vec0 virtual table, joined by rowid. The
/// embeddings table is created on the first upsert, when the vector
/// dimensionality is first observed. One handle is meant to exist per
/// process and be shared behind an `Arc` (see `RagContext`).
pub struct SqliteVectorIndex {
    conn: Connection,
    collection: String,
}

/// The collection name doubles as a table name, so it must be a bare
/// identifier rather than arbitrary SQL text.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), RagError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RagError::Config(format!(
            "collection name '{name}' must be a bare sqlite identifier"
        )))
    }
}

fn register_sqlite_vec() -> Result<(), RagError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(RagError::Storage)
}

impl SqliteVectorIndex {
    /// Opens (or creates) the collection stored at `path`.
    pub async fn open(path: impl AsRef<Path>, collection: &str) -> Result<Self, RagError> {
        validate_collection_name(collection)?;
        register_sqlite_vec()?;

        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        let table = collection.to_string();
        conn.call(move |conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY,
                        metadata TEXT NOT NULL,
                        document TEXT NOT NULL
                    )"
                ),
                [],
            )?;
            Ok::<_, tokio_rusqlite::rusqlite::Error>(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self {
            conn,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Writes one record per id, overwriting any record that shares an id.
    ///
    /// The four sequences must have equal length. The whole batch runs in
    /// one transaction: it commits completely or the call fails with no
    /// partial write. A dimensionality that conflicts with the existing
    /// embeddings table surfaces as [`RagError::Storage`].
    pub async fn upsert(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        documents: Vec<String>,
    ) -> Result<(), RagError> {
        if ids.len() != embeddings.len()
            || ids.len() != metadatas.len()
            || ids.len() != documents.len()
        {
            return Err(RagError::Storage(format!(
                "upsert requires equal-length batches (ids {}, embeddings {}, metadatas {}, documents {})",
                ids.len(),
                embeddings.len(),
                metadatas.len(),
                documents.len()
            )));
        }
        if ids.is_empty() {
            return Ok(());
        }

        let dims = embeddings[0].len();
        if dims == 0 || embeddings.iter().any(|embedding| embedding.len() != dims) {
            return Err(RagError::Storage(
                "embeddings in one batch must share a non-zero dimensionality".into(),
            ));
        }

        let mut rows = Vec::with_capacity(ids.len());
        for ((id, embedding), (metadata, document)) in ids
            .into_iter()
            .zip(embeddings)
            .zip(metadatas.into_iter().zip(documents))
        {
            let metadata = serde_json::to_string(&metadata)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            let embedding = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((id, metadata, document, embedding));
        }

        let table = self.collection.clone();
        let count = rows.len();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS {table}_embeddings
                         USING vec0(embedding float[{dims}])"
                    ),
                    [],
                )?;

                let select_rowid = format!("SELECT rowid FROM {table} WHERE id = ?");
                let update_row =
                    format!("UPDATE {table} SET metadata = ?, document = ? WHERE rowid = ?");
                let insert_row =
                    format!("INSERT INTO {table} (id, metadata, document) VALUES (?, ?, ?)");
                let delete_vec = format!("DELETE FROM {table}_embeddings WHERE rowid = ?");
                let insert_vec =
                    format!("INSERT INTO {table}_embeddings (rowid, embedding) VALUES (?, ?)");

                let tx = conn.transaction()?;
                for (id, metadata, document, embedding) in &rows {
                    let existing: Option<i64> = tx
                        .query_row(&select_rowid, [id], |row| row.get(0))
                        .optional()?;
                    let rowid = match existing {
                        Some(rowid) => {
                            tx.execute(&update_row, (metadata, document, rowid))?;
                            tx.execute(&delete_vec, (rowid,))?;
                            rowid
                        }
                        None => {
                            tx.execute(&insert_row, (id, metadata, document))?;
                            tx.last_insert_rowid()
                        }
                    };
                    tx.execute(&insert_vec, (rowid, embedding))?;
                }
                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        debug!(records = count, collection = %self.collection, "upserted batch");
        Ok(())
    }

    /// Returns the `k` nearest records by cosine distance, nearest first.
    ///
    /// Fewer than `k` rows come back when the collection is smaller; an
    /// empty or not-yet-populated collection yields an empty result rather
    /// than an error.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryResult, RagError> {
        if k == 0 {
            return Ok(QueryResult::default());
        }

        let table = self.collection.clone();
        let query_vec = serde_json::to_string(embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;
        let raw_rows = self
            .conn
            .call(move |conn| {
                let embeddings_table: Option<String> = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                        [format!("{table}_embeddings")],
                        |row| row.get(0),
                    )
                    .optional()?;
                if embeddings_table.is_none() {
                    return Ok(Vec::new());
                }

                let sql = format!(
                    "SELECT c.id, c.metadata, c.document,
                            vec_distance_cosine(e.embedding, vec_f32(?)) AS distance
                     FROM {table} c
                     JOIN {table}_embeddings e ON c.rowid = e.rowid
                     ORDER BY distance ASC
                     LIMIT {k}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([&query_vec], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f32>(3)?,
                    ))
                })?;

                let mut collected = Vec::new();
                for row in rows {
                    collected.push(row?);
                }
                Ok::<_, tokio_rusqlite::rusqlite::Error>(collected)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        let mut result = QueryResult::default();
        for (id, metadata, document, distance) in raw_rows {
            let metadata: ChunkMetadata = serde_json::from_str(&metadata)
                .map_err(|err| RagError::Storage(format!("corrupt metadata for '{id}': {err}")))?;
            result.ids.push(id);
            result.metadatas.push(metadata);
            result.distances.push(distance);
            result.documents.push(document);
        }
        Ok(result)
    }

    /// Number of records currently in the collection.
    pub async fn count(&self) -> Result<usize, RagError> {
        let table = self.collection.clone();
        self.conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}
