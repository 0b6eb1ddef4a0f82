//! In-memory vector index with SQLite persistence.
//!
//! Entries keep insertion order; a row-normalized `(N, dim)` matrix makes a
//! cosine similarity pass a single matrix-vector product. Once built the
//! index is never mutated: a changed corpus means building a new one and
//! swapping it in.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use futures::stream::{self, StreamExt, TryStreamExt};
use ndarray::{Array2, ArrayView1};
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docsage_core::{with_timeout, Capability, Chunk, Error, Metadata, Result};
use docsage_infer::Embedder;

use crate::embedding::{decode_f32, encode_f32};
use crate::schema::*;
use crate::types::*;

/// Database file inside an index directory.
pub const INDEX_FILE: &str = "index.db";

pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    manifest: Manifest,
}

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

impl VectorIndex {
    /// Assemble an index from already-embedded entries.
    pub fn from_entries(entries: Vec<IndexEntry>, settings: BuildSettings) -> Result<Self> {
        let dim = settings.dimension;
        let mut flat = Vec::with_capacity(entries.len() * dim);
        for (position, entry) in entries.iter().enumerate() {
            if entry.embedding.len() != dim {
                return Err(Error::capability(
                    Capability::Embedding,
                    format!(
                        "entry {} has dimension {}, expected {}",
                        position,
                        entry.embedding.len(),
                        dim
                    ),
                ));
            }
            let norm = entry.embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 1e-9 {
                flat.extend(entry.embedding.iter().map(|v| v / norm));
            } else {
                flat.extend(entry.embedding.iter().copied());
            }
        }

        let matrix = Array2::from_shape_vec((entries.len(), dim), flat)
            .map_err(|e| Error::Internal(format!("embedding matrix shape: {}", e)))?;
        let manifest = Manifest::new(settings, entries.len());

        Ok(Self {
            entries,
            matrix,
            manifest,
        })
    }

    /// Embed every chunk and assemble the index.
    ///
    /// Chunks go to the embedder in batches of `batch_size`, with up to
    /// `concurrency` batches in flight; results keep chunk order, so batch
    /// boundaries never affect the outcome.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        options: &BuildOptions,
    ) -> Result<Self> {
        let batch_size = options.batch_size.max(1);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        info!(
            chunks = texts.len(),
            batch_size,
            concurrency = options.concurrency,
            embedder = %embedder.id(),
            "Building vector index"
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(batch_size))
            .map(|batch| async move {
                let vectors = with_timeout(
                    Capability::Embedding,
                    options.timeout,
                    embedder.embed_batch(batch),
                )
                .await?;
                if vectors.len() != batch.len() {
                    return Err(Error::capability(
                        Capability::Embedding,
                        format!("batch of {} texts returned {} vectors", batch.len(), vectors.len()),
                    ));
                }
                debug!(batch = batch.len(), "Embedded batch");
                Ok(vectors)
            })
            .buffered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(batches.into_iter().flatten())
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let settings = BuildSettings {
            dimension: embedder.dimension(),
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
            embedder_id: embedder.id(),
        };
        Self::from_entries(entries, settings)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    /// Cosine similarity of `query` against every entry, in entry order.
    ///
    /// A zero query scores 0 everywhere.
    pub fn similarities(&self, query: &[f32]) -> Result<Vec<f32>> {
        if query.len() != self.dimension() {
            return Err(Error::capability(
                Capability::Embedding,
                format!(
                    "query vector has dimension {}, index has {}",
                    query.len(),
                    self.dimension()
                ),
            ));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < 1e-9 {
            return Ok(vec![0.0; self.entries.len()]);
        }
        let q: Vec<f32> = query.iter().map(|v| v / norm).collect();

        // (N, dim) @ (dim,) → (N,)
        Ok(self.matrix.dot(&ArrayView1::from(&q[..])).to_vec())
    }

    /// Cosine similarity between two entries.
    pub fn pairwise(&self, a: usize, b: usize) -> f32 {
        self.matrix.row(a).dot(&self.matrix.row(b))
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Persist to `location`, replacing whatever is there.
    ///
    /// The index is written to a sibling staging directory first and then
    /// renamed into place, so a reader never opens a partially written
    /// index. Replacing an existing index takes two renames; a `load` that
    /// lands between them finds nothing and fails with `IndexUnavailable`.
    /// Running services swap through `ChatOrchestrator::reload_index`,
    /// which keeps serving the current index when a load fails.
    pub fn save(&self, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let parent = match location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        let name = location
            .file_name()
            .ok_or_else(|| Error::Storage(format!("invalid index location: {}", location.display())))?
            .to_string_lossy()
            .to_string();
        fs::create_dir_all(&parent)?;

        let staging = parent.join(format!(".{}.staging-{}", name, Uuid::new_v4()));
        fs::create_dir_all(&staging)?;
        if let Err(e) = self.write_db(&staging.join(INDEX_FILE)) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if location.exists() {
            let retired = parent.join(format!(".{}.retired-{}", name, Uuid::new_v4()));
            fs::rename(location, &retired)?;
            if let Err(e) = fs::rename(&staging, location) {
                let _ = fs::rename(&retired, location);
                let _ = fs::remove_dir_all(&staging);
                return Err(e.into());
            }
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("Failed to remove retired index {}: {}", retired.display(), e);
            }
        } else {
            fs::rename(&staging, location)?;
        }

        info!(
            entries = self.len(),
            dim = self.dimension(),
            path = %location.display(),
            "Vector index saved"
        );
        Ok(())
    }

    fn write_db(&self, db_path: &Path) -> Result<()> {
        let mut conn = Connection::open(db_path).map_err(storage)?;
        conn.execute_batch(SCHEMA_SQL).map_err(storage)?;

        let tx = conn.transaction().map_err(storage)?;
        {
            let m = &self.manifest;
            let rows = [
                (KEY_FORMAT_VERSION, m.format_version.to_string()),
                (KEY_DIMENSION, m.dimension.to_string()),
                (KEY_CHUNK_SIZE, m.chunk_size.to_string()),
                (KEY_CHUNK_OVERLAP, m.chunk_overlap.to_string()),
                (KEY_EMBEDDER_ID, m.embedder_id.clone()),
                (KEY_ENTRY_COUNT, m.entry_count.to_string()),
                (KEY_BUILT_AT, m.built_at.clone()),
            ];
            let mut stmt = tx
                .prepare_cached("INSERT INTO manifest (key, value) VALUES (?1, ?2)")
                .map_err(storage)?;
            for (key, value) in rows {
                stmt.execute(params![key, value]).map_err(storage)?;
            }

            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO entries (position, id, document_id, chunk_index, char_start, char_end, text, metadata_json, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(storage)?;
            for (position, entry) in self.entries.iter().enumerate() {
                let chunk = &entry.chunk;
                let metadata_json = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    position as i64,
                    chunk.id,
                    chunk.document_id,
                    chunk.chunk_index as i64,
                    chunk.char_start as i64,
                    chunk.char_end as i64,
                    chunk.text,
                    metadata_json,
                    encode_f32(&entry.embedding),
                ])
                .map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    /// Load a persisted index.
    ///
    /// A missing directory, missing `index.db`, or any read or decode
    /// failure is reported as [`Error::IndexUnavailable`].
    pub fn load(location: impl AsRef<Path>) -> Result<Self> {
        let db_path = location.as_ref().join(INDEX_FILE);
        if !db_path.is_file() {
            return Err(Error::IndexUnavailable(format!(
                "{} does not exist; run ingestion first",
                db_path.display()
            )));
        }

        let index = Self::read_db(&db_path).map_err(|e| match e {
            Error::IndexUnavailable(_) => e,
            other => Error::IndexUnavailable(format!("{}: {}", db_path.display(), other)),
        })?;

        info!(
            entries = index.len(),
            dim = index.dimension(),
            embedder = %index.manifest.embedder_id,
            path = %db_path.display(),
            "Vector index loaded"
        );
        Ok(index)
    }

    fn read_db(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage)?;

        let mut stmt = conn.prepare("SELECT key, value FROM manifest").map_err(storage)?;
        let pairs: HashMap<String, String> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(storage)?
            .collect::<std::result::Result<_, _>>()
            .map_err(storage)?;
        let manifest = parse_manifest(&pairs)?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::IndexUnavailable(format!(
                "unsupported index format version {}",
                manifest.format_version
            )));
        }

        let mut stmt = conn
            .prepare(
                "SELECT id, document_id, chunk_index, char_start, char_end, text, metadata_json, embedding
                 FROM entries ORDER BY position",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    Chunk {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        char_start: row.get::<_, i64>(3)? as usize,
                        char_end: row.get::<_, i64>(4)? as usize,
                        text: row.get(5)?,
                        metadata: Metadata::new(),
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, Vec<u8>>(7)?,
                ))
            })
            .map_err(storage)?;

        let mut entries = Vec::with_capacity(manifest.entry_count);
        for row in rows {
            let (mut chunk, metadata_json, blob) = row.map_err(storage)?;
            chunk.metadata = serde_json::from_str(&metadata_json)?;
            entries.push(IndexEntry {
                chunk,
                embedding: decode_f32(&blob)?,
            });
        }

        if entries.len() != manifest.entry_count {
            return Err(Error::IndexUnavailable(format!(
                "manifest lists {} entries, found {}",
                manifest.entry_count,
                entries.len()
            )));
        }

        let mut index = Self::from_entries(entries, manifest.settings())?;
        index.manifest = manifest;
        Ok(index)
    }
}

fn parse_manifest(pairs: &HashMap<String, String>) -> Result<Manifest> {
    fn field<'a>(pairs: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
        pairs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::IndexUnavailable(format!("manifest is missing '{}'", key)))
    }
    fn number<T: std::str::FromStr>(pairs: &HashMap<String, String>, key: &str) -> Result<T> {
        field(pairs, key)?
            .parse()
            .map_err(|_| Error::IndexUnavailable(format!("manifest field '{}' is not a number", key)))
    }

    Ok(Manifest {
        format_version: number(pairs, KEY_FORMAT_VERSION)?,
        dimension: number(pairs, KEY_DIMENSION)?,
        chunk_size: number(pairs, KEY_CHUNK_SIZE)?,
        chunk_overlap: number(pairs, KEY_CHUNK_OVERLAP)?,
        embedder_id: field(pairs, KEY_EMBEDDER_ID)?.to_string(),
        entry_count: number(pairs, KEY_ENTRY_COUNT)?,
        built_at: field(pairs, KEY_BUILT_AT)?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use docsage_core::META_SOURCE;
    use docsage_infer::HashEmbedder;
    use tempfile::TempDir;

    fn chunk(doc: &str, index: usize, text: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.into(), format!("{}.txt", doc));
        metadata.insert("page".into(), "2".into());
        Chunk {
            id: format!("{}-{}", doc, index),
            document_id: doc.into(),
            text: text.into(),
            metadata,
            chunk_index: index,
            char_start: index * 10,
            char_end: index * 10 + text.chars().count(),
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("policy", 0, "Nhân viên được nghỉ phép 12 ngày mỗi năm."),
            chunk("policy", 1, "Remote work is allowed two days per week."),
            chunk("process", 0, "The hiring process has three interview rounds."),
            chunk("process", 1, "Expense claims are submitted within 30 days."),
            chunk("general", 0, "The office is closed on public holidays."),
        ]
    }

    fn options(batch_size: usize) -> BuildOptions {
        BuildOptions {
            batch_size,
            concurrency: 2,
            timeout: Duration::from_secs(5),
            chunk_size: 512,
            chunk_overlap: 100,
        }
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let embedder = HashEmbedder::new(64);
        let index = VectorIndex::build(corpus(), &embedder, &options(2)).await.unwrap();
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("vectorstore");

        index.save(&location).unwrap();
        let loaded = VectorIndex::load(&location).unwrap();

        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.manifest(), index.manifest());
        assert_eq!(loaded.manifest().embedder_id, "hash-v1-64");
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_vectors() {
        let embedder = HashEmbedder::new(32);
        let a = VectorIndex::build(corpus(), &embedder, &options(1)).await.unwrap();
        let b = VectorIndex::build(corpus(), &embedder, &options(64)).await.unwrap();
        assert_eq!(a.entries(), b.entries());
    }

    #[tokio::test]
    async fn test_save_replaces_existing_index() {
        let embedder = HashEmbedder::new(16);
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("vectorstore");

        let full = VectorIndex::build(corpus(), &embedder, &options(8)).await.unwrap();
        full.save(&location).unwrap();
        let small = VectorIndex::build(corpus()[..2].to_vec(), &embedder, &options(8))
            .await
            .unwrap();
        small.save(&location).unwrap();

        assert_eq!(VectorIndex::load(&location).unwrap().len(), 2);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let result = VectorIndex::load(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::IndexUnavailable(_))));
    }

    #[test]
    fn test_load_corrupt_is_unavailable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"definitely not sqlite").unwrap();
        let result = VectorIndex::load(dir.path());
        assert!(matches!(result, Err(Error::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_similarities_rank_matching_chunk_first() {
        let embedder = HashEmbedder::new(256);
        let index = VectorIndex::build(corpus(), &embedder, &options(4)).await.unwrap();
        let query = embedder.embed("hiring interview process").await.unwrap();
        let scores = index.similarities(&query).unwrap();

        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(index.entries()[best].chunk.id, "process-0");
        assert!((index.pairwise(best, best) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let embedder = HashEmbedder::new(8);
        let index = VectorIndex::build(corpus(), &embedder, &options(4)).await.unwrap();
        assert!(matches!(
            index.similarities(&[1.0, 0.0]),
            Err(Error::Capability { .. })
        ));
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 3])
        }
        fn dimension(&self) -> usize {
            4
        }
        fn id(&self) -> String {
            "short".into()
        }
    }

    #[tokio::test]
    async fn test_wrong_vector_dimension_rejected() {
        let result = VectorIndex::build(corpus(), &ShortEmbedder, &options(2)).await;
        assert!(matches!(result, Err(Error::Capability { .. })));
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0; 4])
        }
        fn dimension(&self) -> usize {
            4
        }
        fn id(&self) -> String {
            "slow".into()
        }
    }

    #[tokio::test]
    async fn test_embedding_timeout_surfaces() {
        let opts = BuildOptions {
            timeout: Duration::from_millis(20),
            ..options(8)
        };
        let result = VectorIndex::build(corpus(), &SlowEmbedder, &opts).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }
}
